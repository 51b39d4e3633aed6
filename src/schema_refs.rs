use roxmltree::{Document, Node, ParsingOptions};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ExtractError, Result};
use crate::normalize::{PathNormalizer, parent_dir};

/// XML Schema namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Kind of schema-to-schema reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Import,
    Include,
}

impl ReferenceKind {
    fn from_local_name(name: &str) -> Option<Self> {
        match name {
            "import" => Some(ReferenceKind::Import),
            "include" => Some(ReferenceKind::Include),
            _ => None,
        }
    }
}

/// A declared `import`/`include` from one schema document to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReference {
    pub kind: ReferenceKind,
    /// `schemaLocation` exactly as written
    pub location: String,
    /// Location resolved against the declaring document and normalized
    pub resolved: String,
}

impl SchemaReference {
    /// Normalized form of the declared location, ignoring the declaring document
    pub fn declared_key(&self, normalizer: &PathNormalizer) -> String {
        normalizer.normalize(&self.location)
    }
}

/// Parse schema text with the options every module in this crate uses.
pub fn parse_document<'a>(path: &Path, text: &'a str) -> Result<Document<'a>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(text, options).map_err(|e| ExtractError::parse(path, e))
}

/// Read and parse the schema at `path`, then hand the document and its file
/// name to `f`.
pub fn with_schema_file<T>(path: &Path, f: impl FnOnce(&Document, &str) -> T) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    let doc = parse_document(path, &text)?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(f(&doc, &filename))
}

/// True when `node` is an XSD element with the given local name.
///
/// Documents without the XSD namespace bound are matched on local name alone.
pub fn is_xsd(node: &Node, local_name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local_name
        && node
            .tag_name()
            .namespace()
            .is_none_or(|ns| ns == XSD_NAMESPACE)
}

/// Collect every `import`/`include` with a non-empty `schemaLocation`.
///
/// `declaring_key` is the normalized root-relative path of the document; it
/// anchors relative locations.
pub fn parse_references(
    doc: &Document,
    declaring_key: &str,
    normalizer: &PathNormalizer,
) -> Vec<SchemaReference> {
    let base_dir = parent_dir(declaring_key);

    doc.root_element()
        .descendants()
        .filter(|node| node.is_element())
        .filter_map(|node| {
            let kind = ReferenceKind::from_local_name(node.tag_name().name())?;
            if !is_xsd(&node, node.tag_name().name()) {
                return None;
            }
            let location = node.attribute("schemaLocation")?.trim();
            if location.is_empty() {
                return None;
            }
            Some(SchemaReference {
                kind,
                location: location.to_string(),
                resolved: normalizer.resolve(base_dir, location),
            })
        })
        .collect()
}

/// The set of schema files physically present under one root directory,
/// keyed by normalized root-relative path.
#[derive(Debug, Clone)]
pub struct SchemaTree {
    root: PathBuf,
    files: BTreeMap<String, PathBuf>,
    normalizer: PathNormalizer,
}

impl SchemaTree {
    /// Build the tree from discovered file paths; paths outside `root` are ignored.
    pub fn from_files<I>(root: &Path, files: I, normalizer: PathNormalizer) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let files = files
            .into_iter()
            .filter_map(|path| {
                let relative = path.strip_prefix(root).ok()?;
                let relative = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                Some((normalizer.normalize(&relative), path))
            })
            .collect();

        Self {
            root: root.to_path_buf(),
            files,
            normalizer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn normalizer(&self) -> &PathNormalizer {
        &self.normalizer
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.files.contains_key(key)
    }

    /// Normalized keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn path_of(&self, key: &str) -> Option<&Path> {
        self.files.get(key).map(PathBuf::as_path)
    }

    /// Key for an arbitrary user-supplied path (absolute or root-relative).
    pub fn key_for(&self, path: &str) -> String {
        let as_path = Path::new(path);
        match as_path.strip_prefix(&self.root) {
            Ok(relative) => self
                .normalizer
                .normalize(&relative.to_string_lossy().replace('\\', "/")),
            Err(_) => self.normalizer.normalize(path),
        }
    }

    /// Read and parse one document, returning its declared references.
    pub fn references(&self, key: &str) -> Result<Vec<SchemaReference>> {
        let path = self
            .path_of(key)
            .ok_or_else(|| ExtractError::parse(self.root.join(key), "schema file not present"))?;
        with_schema_file(path, |doc, _| parse_references(doc, key, &self.normalizer))
    }
}
