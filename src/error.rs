use std::path::PathBuf;

use thiserror::Error;

/// Main application error type that encompasses all possible failure modes
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Schema parsing error: {path} - {details}")]
    SchemaParse { path: PathBuf, details: String },

    #[error("No entry schema found: {reason}")]
    NoEntrySchema { reason: String },

    #[error("Schema layout not found: {path}")]
    LayoutNotFound { path: PathBuf },

    #[error("Rule configuration error: {0}")]
    Rules(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },
}

impl ExtractError {
    /// Build a parse error for a schema document
    pub fn parse(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        ExtractError::SchemaParse {
            path: path.into(),
            details: err.to_string(),
        }
    }
}

/// Rule configuration error types
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Rule file not readable: {path} - {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("Missing required rule section: {section}")]
    MissingSection { section: String },

    #[error("Invalid rule for '{key}': {reason}")]
    InvalidRule { key: String, reason: String },
}

impl From<RuleError> for ExtractError {
    fn from(err: RuleError) -> Self {
        ExtractError::Rules(err.to_string())
    }
}

impl From<crate::config::ConfigError> for ExtractError {
    fn from(err: crate::config::ConfigError) -> Self {
        ExtractError::Config(err.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Rule result type alias
pub type RuleResult<T> = std::result::Result<T, RuleError>;
