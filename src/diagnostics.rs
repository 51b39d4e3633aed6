//! Advisory diagnostics.
//!
//! Nothing in here changes extraction output; a run collects these and the
//! caller decides how loudly to report them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::import_check::{ReferenceCheck, ReferenceStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Diagnostic {
    /// A reference check entry that is not OK
    Reference { path: String, status: ReferenceStatus },
    /// Several schemas are unreferenced; the first one was taken as entry
    AmbiguousEntry {
        chosen: String,
        candidates: Vec<String>,
    },
    /// Every schema is referenced by something; the first one was taken as entry
    NoUnreferencedEntry { chosen: String },
    /// A schema could not be parsed while scanning for the entry
    UnparsableSchema { path: String, reason: String },
    /// The import check failed and the run continued without it
    ImportCheckFailed { reason: String },
    /// An object schema was skipped under the skip error policy
    SkippedFile { path: String, reason: String },
}

impl Diagnostic {
    pub fn from_check(check: &ReferenceCheck) -> Option<Self> {
        match check.status {
            ReferenceStatus::Ok => None,
            status => Some(Diagnostic::Reference {
                path: check.path.clone(),
                status,
            }),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Reference { path, status } => write!(f, "{path} → {status}"),
            Diagnostic::AmbiguousEntry { chosen, candidates } => write!(
                f,
                "multiple entry candidates [{}], using {chosen}",
                candidates.join(", ")
            ),
            Diagnostic::NoUnreferencedEntry { chosen } => {
                write!(f, "no unreferenced schema, defaulting to {chosen}")
            }
            Diagnostic::UnparsableSchema { path, reason } => {
                write!(f, "failed to parse {path}: {reason}")
            }
            Diagnostic::ImportCheckFailed { reason } => {
                write!(f, "import check failed: {reason}")
            }
            Diagnostic::SkippedFile { path, reason } => write!(f, "skipped {path}: {reason}"),
        }
    }
}
