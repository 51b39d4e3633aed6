use crate::archive::SchemaLayout;
use crate::cli::{Cli, VerbosityLevel};
use crate::engine::{EngineConfig, ErrorPolicy};
use crate::normalize::{DEFAULT_ROOT_PREFIX, PathNormalizer};
use crate::summary::SummaryOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "XSD_EXTRACT_";

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub layout: LayoutConfig,
    pub extraction: ExtractionConfig,
    pub summary: SummaryOptions,
    pub output: OutputConfig,
}

/// Where the schemas sit inside the input
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Schema root directory, relative to the input
    pub schema_dir: String,
    /// Object schema directory, relative to the schema root
    pub objects_dir: String,
    /// Leading segment stripped from reference paths
    pub root_prefix: String,
}

/// Extraction run settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Number of object files processed concurrently
    pub threads: Option<usize>,
    pub error_policy: ErrorPolicy,
    /// Entry schema key; selected automatically when absent
    pub entry: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Verbose output
    pub verbose: bool,
    /// Quiet mode (errors only)
    pub quiet: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let layout = SchemaLayout::default();
        Self {
            schema_dir: layout.schema_dir,
            objects_dir: layout.objects_dir,
            root_prefix: DEFAULT_ROOT_PREFIX.to_string(),
        }
    }
}

impl LayoutConfig {
    pub fn schema_layout(&self) -> SchemaLayout {
        SchemaLayout {
            schema_dir: self.schema_dir.clone(),
            objects_dir: self.objects_dir.clone(),
        }
    }

    pub fn normalizer(&self) -> PathNormalizer {
        PathNormalizer::new(self.root_prefix.clone())
    }
}

impl OutputConfig {
    pub fn verbosity(&self) -> VerbosityLevel {
        VerbosityLevel::from_flags(self.verbose, self.quiet)
    }
}

impl Config {
    /// Engine settings for one run
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_concurrent: ConfigManager::get_thread_count(self),
            error_policy: self.extraction.error_policy,
            layout: self.layout.schema_layout(),
            normalizer: self.layout.normalizer(),
            summary: self.summary.clone(),
            entry: self.extraction.entry.clone(),
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(&SystemEnvProvider, cli).await
    }

    pub async fn load_config_with(env: &impl EnvProvider, cli: &Cli) -> Result<Config> {
        let mut config = match &cli.settings {
            Some(path) => Self::load_from_file(path).await?,
            None => Self::find_config_file().await?.unwrap_or_default(),
        };

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, cli);
        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON); missing keys keep their defaults.
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find a settings file in the working directory, then the user config directory
    pub async fn find_config_file() -> Result<Option<Config>> {
        let mut candidates: Vec<PathBuf> = Self::config_file_names()
            .iter()
            .map(PathBuf::from)
            .collect();
        if let Some(config_dir) = dirs::config_dir() {
            let app_dir = config_dir.join("xsd-extract");
            candidates.extend(Self::config_file_names().iter().map(|name| app_dir.join(name)));
        }

        for path in candidates {
            if tokio::fs::try_exists(&path).await? {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        Ok(None)
    }

    fn config_file_names() -> [&'static str; 4] {
        [
            "xsd-extract.toml",
            "xsd-extract.json",
            ".xsd-extract.toml",
            ".xsd-extract.json",
        ]
    }

    /// Apply `XSD_EXTRACT_*` overrides from a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        let var = |name: &str| env.get(&format!("{ENV_PREFIX}{name}"));
        let invalid = |name: &str, value: &str| {
            ConfigError::Environment(format!("Invalid {ENV_PREFIX}{name} value: {value}"))
        };

        // Layout
        if let Some(dir) = var("SCHEMA_DIR") {
            config.layout.schema_dir = dir;
        }
        if let Some(dir) = var("OBJECTS_DIR") {
            config.layout.objects_dir = dir;
        }
        if let Some(prefix) = var("ROOT_PREFIX") {
            config.layout.root_prefix = prefix;
        }

        // Extraction
        if let Some(threads) = var("THREADS") {
            config.extraction.threads =
                Some(threads.parse().map_err(|_| invalid("THREADS", &threads))?);
        }
        if let Some(policy) = var("ERROR_POLICY") {
            config.extraction.error_policy =
                policy.parse().map_err(|_| invalid("ERROR_POLICY", &policy))?;
        }
        if let Some(entry) = var("ENTRY") {
            config.extraction.entry = Some(entry);
        }

        // Summary
        if let Some(prefix) = var("ATTRIBUTE_PREFIX") {
            config.summary.attribute_prefix = prefix;
        }
        if let Some(prefix) = var("GEOMETRY_PREFIX") {
            config.summary.geometry_prefix = prefix;
        }
        if let Some(suffix) = var("KEY_SUFFIX") {
            config.summary.key_suffix = suffix;
        }

        // Output
        if let Some(verbose) = var("VERBOSE") {
            config.output.verbose = verbose.parse().map_err(|_| invalid("VERBOSE", &verbose))?;
        }
        if let Some(quiet) = var("QUIET") {
            config.output.quiet = quiet.parse().map_err(|_| invalid("QUIET", &quiet))?;
        }

        Ok(config)
    }

    /// Merge CLI arguments into the configuration; only flags that were given override.
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if cli.threads.is_some() {
            config.extraction.threads = cli.threads;
        }
        if cli.fail_fast {
            config.extraction.error_policy = ErrorPolicy::Abort;
        }
        if let Some(entry) = &cli.entry {
            config.extraction.entry = Some(entry.clone());
        }

        if cli.verbose {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }

        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if let Some(threads) = config.extraction.threads {
            if threads == 0 {
                return Err(ConfigError::Validation(
                    "Number of threads must be greater than 0".to_string(),
                ));
            }
            if threads > 1000 {
                return Err(ConfigError::Validation(
                    "Number of threads cannot exceed 1000".to_string(),
                ));
            }
        }

        for (name, dir) in [
            ("schema_dir", &config.layout.schema_dir),
            ("objects_dir", &config.layout.objects_dir),
        ] {
            if dir.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{name} must not be empty")));
            }
            if Path::new(dir).is_absolute() || dir.split(['/', '\\']).any(|s| s == "..") {
                return Err(ConfigError::Validation(format!(
                    "{name} must be a relative path inside the input: {dir}"
                )));
            }
        }

        if config.summary.attribute_prefix.is_empty() || config.summary.geometry_prefix.is_empty()
        {
            return Err(ConfigError::Validation(
                "Summary prefixes must not be empty".to_string(),
            ));
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the effective thread count
    pub fn get_thread_count(config: &Config) -> usize {
        config.extraction.threads.unwrap_or_else(num_cpus::get)
    }
}
