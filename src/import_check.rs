//! Reference closure check.
//!
//! Walks `import`/`include` declarations from the entry schema and compares
//! everything reached against the files present under the schema root.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::error::{ExtractError, Result};
use crate::schema_refs::SchemaTree;

/// Classification of one normalized schema path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceStatus {
    /// Referenced and present on disk
    Ok,
    /// Referenced but absent
    Missing,
    /// Present but never reached from the entry schema
    Unreferenced,
}

impl ReferenceStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ReferenceStatus::Ok)
    }
}

impl fmt::Display for ReferenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReferenceStatus::Ok => "OK",
            ReferenceStatus::Missing => "Missing",
            ReferenceStatus::Unreferenced => "Unreferenced",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCheck {
    pub path: String,
    pub status: ReferenceStatus,
}

/// Result of checking one entry schema's reference closure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub entry: String,
    /// Sorted by path
    pub checks: Vec<ReferenceCheck>,
}

impl ImportReport {
    /// Entries that are not OK, in path order
    pub fn problems(&self) -> impl Iterator<Item = &ReferenceCheck> {
        self.checks.iter().filter(|check| !check.status.is_ok())
    }

    pub fn count(&self, status: ReferenceStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    pub fn status_of(&self, path: &str) -> Option<ReferenceStatus> {
        self.checks
            .iter()
            .find(|check| check.path == path)
            .map(|check| check.status)
    }
}

/// Traverse the reference closure of `entry` and classify every path.
///
/// Only references that resolve to an existing file are expanded further, so
/// dangling references and cycles cannot keep the walk going.
pub fn check_imports(tree: &SchemaTree, entry: &str) -> Result<ImportReport> {
    if !tree.contains(entry) {
        return Err(ExtractError::NoEntrySchema {
            reason: format!("{} is not under {}", entry, tree.root().display()),
        });
    }

    let normalizer = tree.normalizer();
    let mut referenced: BTreeSet<String> = BTreeSet::new();
    let mut expanded: HashSet<String> = HashSet::from([entry.to_string()]);
    let mut frontier: Vec<String> = vec![entry.to_string()];

    while let Some(current) = frontier.pop() {
        for reference in tree.references(&current)? {
            if tree.contains(&reference.resolved) {
                referenced.insert(reference.resolved.clone());
                if expanded.insert(reference.resolved.clone()) {
                    frontier.push(reference.resolved);
                }
            } else {
                referenced.insert(reference.declared_key(normalizer));
            }
        }
    }

    let on_disk: BTreeSet<&str> = tree.keys().collect();
    let mut all_paths: BTreeSet<&str> = referenced.iter().map(String::as_str).collect();
    all_paths.extend(on_disk.iter().copied().filter(|key| *key != entry));

    let checks = all_paths
        .into_iter()
        .map(|path| {
            let status = match (referenced.contains(path), on_disk.contains(path)) {
                (true, true) => ReferenceStatus::Ok,
                (true, false) => ReferenceStatus::Missing,
                _ => ReferenceStatus::Unreferenced,
            };
            ReferenceCheck {
                path: path.to_string(),
                status,
            }
        })
        .collect();

    Ok(ImportReport {
        entry: entry.to_string(),
        checks,
    })
}
