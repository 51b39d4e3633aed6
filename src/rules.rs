//! Rule configuration for the detailed extractor.
//!
//! The rule document has two sections:
//!
//! ```json
//! {
//!   "output_fields": ["filename", "namespace", "name", "type"],
//!   "element_types": {
//!     "OblastObjektuKI": { "exist": true, "minOccurs": true },
//!     "atr:Kod": { "minOccurs": "unique" },
//!     "GeometrieObjektu": { "geometry": true },
//!     "Zaznam": { "attributes": { "id": ["use", "type"] } }
//!   }
//! }
//! ```
//!
//! Rules keep their declaration order; it decides both which rule wins when an
//! element could match several and the order of output columns.

use roxmltree::Node;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{RuleError, RuleResult};
use crate::record::{ColumnLayout, ColumnShape, ColumnSpec};

/// Column holding the lower bound of the geometry container
pub const GEOMETRY_MIN_OCCURS_COLUMN: &str = "geom_minOccurs";

/// Column holding every reference token found under the geometry container
pub const GEOMETRY_COLUMN: &str = "geometry";

/// How an element is compared against a rule key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The element's `name` attribute
    Name,
    /// The element's `ref` attribute
    Ref,
}

impl MatchMode {
    /// Qualified keys can only ever match a `ref`.
    fn infer(key: &str) -> Self {
        if key.contains(':') {
            MatchMode::Ref
        } else {
            MatchMode::Name
        }
    }
}

/// An element attribute recorded under `{base}_{attribute}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSpec {
    pub attribute: String,
    pub unique: bool,
}

/// Properties pulled from a nested attribute declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub attribute: String,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRule {
    pub key: String,
    pub match_mode: MatchMode,
    pub exist: bool,
    pub flags: Vec<FlagSpec>,
    pub attributes: Vec<AttributeSpec>,
    pub geometry: bool,
    /// Local name of an ancestor the element must sit under
    pub within: Option<String>,
}

impl ExtractionRule {
    /// A rule with no flags, matched by the mode the key implies
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            match_mode: MatchMode::infer(&key),
            key,
            exist: false,
            flags: Vec::new(),
            attributes: Vec::new(),
            geometry: false,
            within: None,
        }
    }

    /// Column name for the rule itself; reference keys lose their prefix.
    pub fn base_column(&self) -> &str {
        match self.match_mode {
            MatchMode::Name => &self.key,
            MatchMode::Ref => local_part(&self.key),
        }
    }

    pub fn flag_column(&self, flag: &FlagSpec) -> String {
        format!("{}_{}", self.base_column(), flag.attribute)
    }

    pub fn attribute_column(attribute: &str, property: &str) -> String {
        format!("{attribute}_{property}")
    }

    /// Columns this rule can produce, with their shapes, in output order
    pub fn columns(&self) -> Vec<ColumnSpec> {
        let mut columns = Vec::new();

        if self.exist {
            columns.push(ColumnSpec::new(self.base_column(), ColumnShape::Scalar));
        }
        for flag in &self.flags {
            let shape = if flag.unique {
                ColumnShape::AlwaysList
            } else {
                ColumnShape::Collapsing
            };
            columns.push(ColumnSpec::new(self.flag_column(flag), shape));
        }
        for spec in &self.attributes {
            for property in &spec.properties {
                columns.push(ColumnSpec::new(
                    Self::attribute_column(&spec.attribute, property),
                    ColumnShape::Scalar,
                ));
            }
        }
        if self.geometry {
            columns.push(ColumnSpec::new(
                GEOMETRY_MIN_OCCURS_COLUMN,
                ColumnShape::Scalar,
            ));
            columns.push(ColumnSpec::new(GEOMETRY_COLUMN, ColumnShape::AlwaysList));
        }

        columns
    }

    /// Whether `node` (an XSD `element` declaration) is matched by this rule
    pub fn matches(&self, node: &Node) -> bool {
        if let Some(within) = &self.within
            && !node
                .ancestors()
                .skip(1)
                .any(|a| a.is_element() && a.tag_name().name() == within)
        {
            return false;
        }

        match self.match_mode {
            MatchMode::Name => node.attribute("name") == Some(self.key.as_str()),
            MatchMode::Ref => match node.attribute("ref") {
                Some(reference) if reference == self.key => true,
                Some(reference) => !self.key.contains(':') && local_part(reference) == self.key,
                None => false,
            },
        }
    }

    fn from_value(key: &str, value: &Value) -> RuleResult<Self> {
        let invalid = |reason: &str| RuleError::InvalidRule {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        let mut rule = ExtractionRule::new(key);
        let Some(body) = value.as_object() else {
            return match value {
                Value::Bool(true) | Value::Null => Ok(rule),
                _ => Err(invalid("rule must be an object")),
            };
        };

        let mut all_unique = false;
        for (name, setting) in body {
            match name.as_str() {
                "exist" => {
                    rule.exist = setting
                        .as_bool()
                        .ok_or_else(|| invalid("exist must be a boolean"))?
                }
                "geometry" => {
                    rule.geometry = setting
                        .as_bool()
                        .ok_or_else(|| invalid("geometry must be a boolean"))?
                }
                "unique" => {
                    all_unique = setting
                        .as_bool()
                        .ok_or_else(|| invalid("unique must be a boolean"))?
                }
                "match" => {
                    rule.match_mode = serde_json::from_value(setting.clone())
                        .map_err(|_| invalid("match must be \"name\" or \"ref\""))?
                }
                "within" => {
                    let within = setting
                        .as_str()
                        .ok_or_else(|| invalid("within must be a string"))?;
                    rule.within = Some(within.to_string());
                }
                "attributes" => {
                    rule.attributes = parse_attributes(setting).ok_or_else(|| {
                        invalid("attributes must map attribute names to lists of properties")
                    })?
                }
                flag => match setting {
                    Value::Bool(true) => rule.flags.push(FlagSpec {
                        attribute: flag.to_string(),
                        unique: false,
                    }),
                    Value::Bool(false) => {}
                    Value::String(mode) if mode == "unique" => rule.flags.push(FlagSpec {
                        attribute: flag.to_string(),
                        unique: true,
                    }),
                    _ => {
                        return Err(invalid(&format!(
                            "flag '{flag}' must be true, false or \"unique\""
                        )));
                    }
                },
            }
        }

        if all_unique {
            rule.flags.iter_mut().for_each(|flag| flag.unique = true);
        }

        Ok(rule)
    }
}

/// The complete rule configuration for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    /// Columns every record starts with, in declared order
    pub output_fields: Vec<String>,
    pub rules: Vec<ExtractionRule>,
}

impl RuleSet {
    pub fn new(output_fields: Vec<String>, rules: Vec<ExtractionRule>) -> Self {
        Self {
            output_fields,
            rules,
        }
    }

    /// Load rules from a file (JSON or TOML, chosen by extension)
    pub async fn load(path: &Path) -> RuleResult<Self> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| RuleError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    pub fn from_json_str(content: &str) -> RuleResult<Self> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(&value)
    }

    pub fn from_toml_str(content: &str) -> RuleResult<Self> {
        let value: Value = toml::from_str(content)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> RuleResult<Self> {
        let output_fields = match value.get("output_fields") {
            None => Vec::new(),
            Some(fields) => string_list(fields).ok_or_else(|| RuleError::InvalidRule {
                key: "output_fields".to_string(),
                reason: "must be a list of strings".to_string(),
            })?,
        };

        let element_types = value
            .get("element_types")
            .and_then(Value::as_object)
            .ok_or_else(|| RuleError::MissingSection {
                section: "element_types".to_string(),
            })?;

        let rules = element_types
            .iter()
            .map(|(key, rule)| ExtractionRule::from_value(key, rule))
            .collect::<RuleResult<Vec<_>>>()?;

        Ok(Self::new(output_fields, rules))
    }

    /// First rule in declaration order that matches `node`
    pub fn rule_for(&self, node: &Node) -> Option<&ExtractionRule> {
        self.rules.iter().find(|rule| rule.matches(node))
    }

    /// Existence columns, which every record carries from the start
    pub fn existence_columns(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .filter(|rule| rule.exist)
            .map(ExtractionRule::base_column)
    }

    /// Statically known column order and shapes
    pub fn layout(&self) -> ColumnLayout {
        let mut layout = ColumnLayout::with_leading(&self.output_fields);
        for rule in &self.rules {
            for column in rule.columns() {
                layout.push(column);
            }
        }
        layout
    }
}

/// Part of a qualified name after the prefix
pub fn local_part(qname: &str) -> &str {
    qname.rsplit_once(':').map(|(_, local)| local).unwrap_or(qname)
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn parse_attributes(value: &Value) -> Option<Vec<AttributeSpec>> {
    let map: &Map<String, Value> = value.as_object()?;
    map.iter()
        .map(|(attribute, properties)| {
            Some(AttributeSpec {
                attribute: attribute.clone(),
                properties: string_list(properties)?,
            })
        })
        .collect()
}
