//! Per-reference summary rows.
//!
//! Every `complexType` in an object schema contributes one row per attribute
//! reference, plus one aggregated row holding all of its geometry references.

use roxmltree::Document;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::schema_refs::is_xsd;

/// Header of the summary table
pub const SUMMARY_COLUMNS: [&str; 3] = ["filename", "name", "minOccurs"];

/// Token conventions used to classify references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryOptions {
    pub attribute_prefix: String,
    pub geometry_prefix: String,
    /// Suffix marking key-indicator attributes, emitted after the geometry row
    pub key_suffix: String,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            attribute_prefix: "atr:".to_string(),
            geometry_prefix: "gml:".to_string(),
            key_suffix: "KI".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub filename: String,
    /// Reference token, or the JSON list of geometry tokens
    pub name: String,
    #[serde(rename = "minOccurs")]
    pub min_occurs: Option<String>,
}

impl SummaryRow {
    pub fn to_record(&self) -> [&str; 3] {
        [
            self.filename.as_str(),
            self.name.as_str(),
            self.min_occurs.as_deref().unwrap_or(""),
        ]
    }
}

/// `(filename, reference)` pairs already emitted
#[derive(Debug, Clone, Default)]
pub struct SeenRefs {
    seen: HashSet<(String, String)>,
}

impl SeenRefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the pair; false if it was already present.
    pub fn insert(&mut self, filename: &str, reference: &str) -> bool {
        self.seen
            .insert((filename.to_string(), reference.to_string()))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Append the summary rows of one document to `rows`.
pub fn fold_summary(
    doc: &Document,
    filename: &str,
    seen: &mut SeenRefs,
    options: &SummaryOptions,
    rows: &mut Vec<SummaryRow>,
) {
    let row = |name: &str, min_occurs: Option<&str>| SummaryRow {
        filename: filename.to_string(),
        name: name.to_string(),
        min_occurs: min_occurs.map(str::to_string),
    };

    for complex_type in doc.descendants().filter(|n| is_xsd(n, "complexType")) {
        let mut plain = Vec::new();
        let mut key_indicators = Vec::new();
        let mut geometry: Vec<&str> = Vec::new();
        let mut optional = false;

        for element in complex_type
            .descendants()
            .skip(1)
            .filter(|n| is_xsd(n, "element"))
        {
            let Some(reference) = element.attribute("ref") else {
                continue;
            };
            if !seen.insert(filename, reference) {
                continue;
            }
            let min_occurs = element.attribute("minOccurs");

            if reference.starts_with(options.attribute_prefix.as_str()) {
                if reference.ends_with(options.key_suffix.as_str()) {
                    optional |= min_occurs == Some("0");
                    key_indicators.push(row(reference, min_occurs));
                } else {
                    plain.push(row(reference, min_occurs));
                }
            } else if reference.starts_with(options.geometry_prefix.as_str()) {
                optional |= min_occurs == Some("0");
                geometry.push(reference);
            }
        }

        rows.append(&mut plain);
        if !geometry.is_empty() {
            let tokens = serde_json::to_string(&geometry).unwrap_or_default();
            rows.push(row(&tokens, optional.then_some("0")));
        }
        rows.append(&mut key_indicators);
    }
}
