use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show critical errors
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show detailed information
    Verbose,
}

impl VerbosityLevel {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            VerbosityLevel::Quiet
        } else if verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Default `tracing` filter directive for this level
    pub fn filter_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "debug",
        }
    }
}

/// Extract tabular records from packaged XML Schema files
#[derive(Parser, Debug, Clone)]
#[command(name = "xsd-extract")]
#[command(
    about = "Check schema cross-references and extract per-file records from an XSD package"
)]
#[command(version)]
pub struct Cli {
    /// Zip archive or unpacked directory holding the schema tree
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Rule configuration (JSON, or TOML by extension)
    #[arg(short = 'r', long = "rules")]
    pub rules: PathBuf,

    /// Write the detailed per-file table to this CSV file
    #[arg(short = 'd', long = "detailed")]
    pub detailed: Option<PathBuf>,

    /// Write the per-reference summary table to this CSV file
    #[arg(short = 's', long = "summary")]
    pub summary: Option<PathBuf>,

    /// Entry schema, relative to the schema directory
    #[arg(short = 'e', long = "entry")]
    pub entry: Option<String>,

    /// Settings file (TOML or JSON)
    #[arg(short = 'c', long = "settings")]
    pub settings: Option<PathBuf>,

    /// Number of object files processed concurrently
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    /// Abort on the first unreadable schema instead of skipping it
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.input.exists() {
            return Err(format!("Input does not exist: {}", self.input.display()));
        }
        if !self.rules.is_file() {
            return Err(format!("Rule file not found: {}", self.rules.display()));
        }
        if let Some(threads) = self.threads
            && threads == 0
        {
            return Err("Number of threads must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        VerbosityLevel::from_flags(self.verbose, self.quiet)
    }
}
