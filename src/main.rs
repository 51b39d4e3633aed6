use anyhow::{Context, Result, bail};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use xsd_extract::output::{write_detailed_file, write_summary_file};
use xsd_extract::{Cli, ConfigManager, ExtractionEngine, Output, RuleSet, VerbosityLevel};

fn init_tracing(verbosity: VerbosityLevel) {
    // RUST_LOG wins over -v/-q
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    if let Err(message) = cli.validate() {
        bail!(message);
    }

    let config = ConfigManager::load_config(&cli)
        .await
        .context("failed to load settings")?;
    let verbosity = config.output.verbosity();
    init_tracing(verbosity);

    let rules = RuleSet::load(&cli.rules)
        .await
        .with_context(|| format!("failed to load rules from {}", cli.rules.display()))?;
    info!(rules = rules.rules.len(), "rules loaded");

    let engine = ExtractionEngine::new(rules, config.engine_config());
    let report = engine
        .run(&cli.input)
        .await
        .with_context(|| format!("extraction failed for {}", cli.input.display()))?;

    if let Some(path) = &cli.detailed {
        write_detailed_file(path, &report.columns, &report.records)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), rows = report.records.len(), "detailed table written");
    }
    if let Some(path) = &cli.summary {
        write_summary_file(path, &report.summary)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), rows = report.summary.len(), "summary table written");
    }

    print!("{}", Output::new(verbosity).format_report(&report));
    Ok(())
}
