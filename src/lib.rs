//! # xsd-extract Library
//!
//! Checks the import/include closure of a packaged XML Schema tree and flattens
//! each object schema into one tabular record, driven by a declarative rule set.

pub mod archive;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod entry;
pub mod error;
pub mod extractor;
pub mod file_discovery;
pub mod import_check;
pub mod normalize;
pub mod output;
pub mod record;
pub mod rules;
pub mod schema_refs;
pub mod summary;

pub use archive::{SchemaLayout, UnpackedInput, open_input};
pub use cli::{Cli, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager, EnvProvider, SystemEnvProvider};
pub use diagnostics::Diagnostic;
pub use engine::{
    EngineConfig, ErrorPolicy, ExtractionEngine, FileOutcome, RunMetrics, RunReport,
};
pub use entry::{EntrySelection, SelectionKind, select_entry};
pub use error::{ExtractError, Result, RuleError};
pub use extractor::Extractor;
pub use file_discovery::FileDiscovery;
pub use import_check::{ImportReport, ReferenceCheck, ReferenceStatus, check_imports};
pub use normalize::{PathNormalizer, normalize_path};
pub use output::Output;
pub use record::{CellValue, ColumnLayout, ColumnShape, ColumnSpec, ExtractionRecord};
pub use rules::{ExtractionRule, MatchMode, RuleSet};
pub use schema_refs::{ReferenceKind, SchemaReference, SchemaTree};
pub use summary::{SeenRefs, SummaryOptions, SummaryRow, fold_summary};
