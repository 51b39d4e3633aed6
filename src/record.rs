//! Flattened per-file records and their column order.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// File identity columns that lead every detailed table
pub const LEADING_COLUMNS: [&str; 4] = ["filename", "namespace", "name", "type"];

/// Value of one cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Int(i64),
    Text(String),
    List(Vec<String>),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            CellValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Text form used in tables; lists render as JSON arrays.
    pub fn render(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Int(value) => value.to_string(),
            CellValue::Text(text) => text.clone(),
            CellValue::List(items) => serde_json::to_string(items).unwrap_or_default(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(text: &str) -> Self {
        CellValue::Text(text.to_string())
    }
}

/// Output shape of a column, fixed when the rules are compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnShape {
    /// Single value
    Scalar,
    /// Built as a list, emitted as a scalar when it holds one value
    Collapsing,
    /// Always emitted as a list
    AlwaysList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub shape: ColumnShape,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, shape: ColumnShape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }
}

/// Statically known columns in output order
#[derive(Debug, Clone, Default)]
pub struct ColumnLayout {
    columns: Vec<ColumnSpec>,
    index: HashMap<String, usize>,
}

impl ColumnLayout {
    /// Leading identity columns followed by the declared output fields
    pub fn with_leading(output_fields: &[String]) -> Self {
        let mut layout = Self::default();
        for name in LEADING_COLUMNS
            .iter()
            .copied()
            .chain(output_fields.iter().map(String::as_str))
        {
            layout.push(ColumnSpec::new(name, ColumnShape::Scalar));
        }
        layout
    }

    /// Append a column. A name already placed keeps its first position, but a
    /// list shape declared later replaces a scalar placeholder.
    pub fn push(&mut self, spec: ColumnSpec) {
        if let Some(&i) = self.index.get(&spec.name) {
            let placed = &mut self.columns[i];
            if placed.shape == ColumnShape::Scalar {
                placed.shape = spec.shape;
            }
            return;
        }
        self.index.insert(spec.name.clone(), self.columns.len());
        self.columns.push(spec);
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter()
    }

    pub fn shape_of(&self, name: &str) -> Option<ColumnShape> {
        self.index.get(name).map(|&i| self.columns[i].shape)
    }

    /// Final header: the static layout, then columns found only in data in
    /// first-seen order over `records`.
    pub fn resolve(&self, records: &[ExtractionRecord]) -> Vec<String> {
        let mut header: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        let mut extra_seen: HashSet<&str> = HashSet::new();

        for record in records {
            for name in record.column_names() {
                if !self.index.contains_key(name) && extra_seen.insert(name) {
                    header.push(name.to_string());
                }
            }
        }

        header
    }
}

/// One output row for one schema file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionRecord {
    cells: Vec<(String, CellValue)>,
    index: HashMap<String, usize>,
}

impl ExtractionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&CellValue> {
        self.index.get(name).map(|&i| &self.cells[i].1)
    }

    /// Rendered cell text, empty when the column is absent
    pub fn render(&self, name: &str) -> String {
        self.get(name).map(CellValue::render).unwrap_or_default()
    }

    /// Column names in the order they were first written
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn set(&mut self, name: &str, value: CellValue) {
        match self.index.get(name) {
            Some(&i) => self.cells[i].1 = value,
            None => {
                self.index.insert(name.to_string(), self.cells.len());
                self.cells.push((name.to_string(), value));
            }
        }
    }

    /// Write only if the column is absent or still empty. Returns whether it wrote.
    pub fn set_if_unset(&mut self, name: &str, value: CellValue) -> bool {
        if self.get(name).is_some_and(|cell| !cell.is_empty()) {
            return false;
        }
        self.set(name, value);
        true
    }

    /// Append to a list column, keeping encounter order and duplicates
    pub fn push(&mut self, name: &str, value: &str) {
        self.list_mut(name).push(value.to_string());
    }

    /// Append unless the value is already present
    pub fn push_unique(&mut self, name: &str, value: &str) {
        let list = self.list_mut(name);
        if !list.iter().any(|existing| existing == value) {
            list.push(value.to_string());
        }
    }

    /// Append every value, creating the list even when there are none
    pub fn extend_list<'v>(&mut self, name: &str, values: impl IntoIterator<Item = &'v str>) {
        let list = self.list_mut(name);
        list.extend(values.into_iter().map(str::to_string));
    }

    fn list_mut(&mut self, name: &str) -> &mut Vec<String> {
        let current = self.get(name).cloned().unwrap_or(CellValue::Empty);
        let list = match current {
            CellValue::List(items) => items,
            CellValue::Empty => Vec::new(),
            other => vec![other.render()],
        };
        self.set(name, CellValue::List(list));

        let i = self.index[name];
        match &mut self.cells[i].1 {
            CellValue::List(items) => items,
            _ => unreachable!("column was just set to a list"),
        }
    }

    /// Collapse singleton lists unless the layout marks them always-list.
    pub fn finalize(&mut self, layout: &ColumnLayout) {
        for (name, cell) in &mut self.cells {
            if layout.shape_of(name) == Some(ColumnShape::AlwaysList) {
                continue;
            }
            if let CellValue::List(items) = cell
                && items.len() == 1
            {
                let value = items.remove(0);
                *cell = CellValue::Text(value);
            }
        }
    }
}
