use std::collections::BTreeSet;

use crate::diagnostics::Diagnostic;
use crate::error::{ExtractError, Result};
use crate::schema_refs::SchemaTree;

/// How the entry schema was decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionKind {
    /// Supplied by the caller
    Explicit,
    /// Exactly one schema is referenced by nobody
    Unique,
    /// Several unreferenced schemas; lexicographically first wins
    Ambiguous { candidates: Vec<String> },
    /// Every schema is referenced; lexicographically first of all files
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySelection {
    pub entry: String,
    pub kind: SelectionKind,
    /// Parse failures met while scanning
    pub diagnostics: Vec<Diagnostic>,
}

impl EntrySelection {
    /// Use a caller-supplied entry; it must be part of the tree.
    pub fn explicit(tree: &SchemaTree, entry: &str) -> Result<Self> {
        let key = tree.key_for(entry);
        if !tree.contains(&key) {
            return Err(ExtractError::NoEntrySchema {
                reason: format!("{} not found under {}", entry, tree.root().display()),
            });
        }
        Ok(Self {
            entry: key,
            kind: SelectionKind::Explicit,
            diagnostics: Vec::new(),
        })
    }

    /// Diagnostics for the caller, including the tie-break warning if any
    pub fn all_diagnostics(&self) -> Vec<Diagnostic> {
        let mut all = self.diagnostics.clone();
        match &self.kind {
            SelectionKind::Ambiguous { candidates } => all.push(Diagnostic::AmbiguousEntry {
                chosen: self.entry.clone(),
                candidates: candidates.clone(),
            }),
            SelectionKind::Fallback => all.push(Diagnostic::NoUnreferencedEntry {
                chosen: self.entry.clone(),
            }),
            SelectionKind::Explicit | SelectionKind::Unique => {}
        }
        all
    }
}

/// Pick the schema nobody imports or includes.
///
/// Always returns a value for a non-empty tree; ties and cycles are resolved
/// by sorted order and flagged in the selection kind.
pub fn select_entry(tree: &SchemaTree) -> Result<EntrySelection> {
    if tree.is_empty() {
        return Err(ExtractError::NoEntrySchema {
            reason: format!("no schema files under {}", tree.root().display()),
        });
    }

    let mut referenced: BTreeSet<String> = BTreeSet::new();
    let mut diagnostics = Vec::new();

    for key in tree.keys() {
        match tree.references(key) {
            Ok(refs) => referenced.extend(refs.into_iter().map(|r| r.resolved)),
            Err(e) => diagnostics.push(Diagnostic::UnparsableSchema {
                path: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    let candidates: Vec<String> = tree
        .keys()
        .filter(|key| !referenced.contains(*key))
        .map(str::to_string)
        .collect();

    let (entry, kind) = match candidates.len() {
        1 => (candidates[0].clone(), SelectionKind::Unique),
        0 => {
            // Non-empty tree, so there is a first key
            let first = tree.keys().next().unwrap_or_default().to_string();
            (first, SelectionKind::Fallback)
        }
        _ => (
            candidates[0].clone(),
            SelectionKind::Ambiguous {
                candidates: candidates.clone(),
            },
        ),
    };

    Ok(EntrySelection {
        entry,
        kind,
        diagnostics,
    })
}
