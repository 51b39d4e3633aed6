//! Rule-driven attribute extraction: one flattened record per schema file.

use roxmltree::{Document, Node};
use std::sync::Arc;

use crate::record::{CellValue, ColumnLayout, ExtractionRecord, LEADING_COLUMNS};
use crate::rules::{
    ExtractionRule, GEOMETRY_COLUMN, GEOMETRY_MIN_OCCURS_COLUMN, MatchMode, RuleSet,
};
use crate::schema_refs::is_xsd;

/// Applies a [`RuleSet`] to schema documents. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Extractor {
    rules: Arc<RuleSet>,
    layout: Arc<ColumnLayout>,
}

impl Extractor {
    pub fn new(rules: RuleSet) -> Self {
        let layout = rules.layout();
        Self {
            rules: Arc::new(rules),
            layout: Arc::new(layout),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    /// Build the record for one parsed document.
    ///
    /// A document with no matching elements still yields a record: identity
    /// columns, declared output fields and every existence flag at 0.
    pub fn extract(&self, doc: &Document, filename: &str) -> ExtractionRecord {
        let root = doc.root_element();
        let namespace = root.attribute("targetNamespace").unwrap_or("");

        let mut record = ExtractionRecord::new();
        for column in LEADING_COLUMNS
            .iter()
            .copied()
            .chain(self.rules.output_fields.iter().map(String::as_str))
        {
            record.set(column, CellValue::Empty);
        }
        record.set("filename", CellValue::from(filename));
        record.set("namespace", CellValue::from(namespace));
        for column in self.rules.existence_columns() {
            record.set(column, CellValue::Int(0));
        }

        if let Some(top) = top_level_element(&root, namespace) {
            record.set("name", CellValue::from(top.attribute("name").unwrap_or("")));
            record.set("type", CellValue::from(top.attribute("type").unwrap_or("")));
        }

        for node in root.descendants() {
            if !is_xsd(&node, "element") || node.parent() == Some(root) {
                continue;
            }
            if let Some(rule) = self.rules.rule_for(&node) {
                apply_rule(rule, &node, &mut record);
            }
        }

        record.finalize(&self.layout);
        record
    }
}

fn apply_rule(rule: &ExtractionRule, node: &Node, record: &mut ExtractionRecord) {
    if rule.exist {
        record.set(rule.base_column(), CellValue::Int(1));
    }

    for flag in &rule.flags {
        if let Some(value) = node.attribute(flag.attribute.as_str()) {
            let column = rule.flag_column(flag);
            if flag.unique {
                record.push_unique(&column, value);
            } else {
                record.push(&column, value);
            }
        }
    }

    let key_attribute = match rule.match_mode {
        MatchMode::Name => "name",
        MatchMode::Ref => "ref",
    };
    for spec in &rule.attributes {
        let declaration = node.descendants().skip(1).find(|d| {
            is_xsd(d, "attribute") && d.attribute(key_attribute) == Some(spec.attribute.as_str())
        });
        let Some(declaration) = declaration else {
            continue;
        };
        for property in &spec.properties {
            if let Some(value) = declaration.attribute(property.as_str()) {
                record.set_if_unset(
                    &ExtractionRule::attribute_column(&spec.attribute, property),
                    CellValue::from(value),
                );
            }
        }
    }

    if rule.geometry {
        if let Some(min_occurs) = node.attribute("minOccurs") {
            record.set_if_unset(GEOMETRY_MIN_OCCURS_COLUMN, CellValue::from(min_occurs));
        }
        let references = node
            .descendants()
            .skip(1)
            .filter(|d| is_xsd(d, "element"))
            .filter_map(|d| d.attribute("ref"));
        record.extend_list(GEOMETRY_COLUMN, references);
    }
}

/// First top-level element whose type lives in the target namespace
fn top_level_element<'a, 'input>(
    root: &Node<'a, 'input>,
    namespace: &str,
) -> Option<Node<'a, 'input>> {
    root.children()
        .filter(|child| is_xsd(child, "element"))
        .find(|child| {
            child
                .attribute("type")
                .is_some_and(|ty| type_in_namespace(child, ty, namespace))
        })
}

fn type_in_namespace(node: &Node, qname: &str, namespace: &str) -> bool {
    if !namespace.is_empty()
        && qname
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.starts_with(':'))
    {
        return true;
    }
    let prefix = qname.split_once(':').map(|(prefix, _)| prefix);
    node.lookup_namespace_uri(prefix).unwrap_or("") == namespace
}
