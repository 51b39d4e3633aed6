//! Extraction run orchestration.
//!
//! - **Async I/O**: input unpacking and schema discovery
//! - **Blocking CPU work**: XML parsing, reference checks and extraction run in `spawn_blocking`
//! - **Bounded concurrency**: a semaphore caps the number of object files in flight
//!
//! Results are put back into sorted file order before assembly, so output does
//! not depend on task scheduling.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::archive::{SchemaLayout, UnpackedInput, open_input};
use crate::diagnostics::Diagnostic;
use crate::entry::{EntrySelection, select_entry};
use crate::error::{ExtractError, Result};
use crate::extractor::Extractor;
use crate::file_discovery::FileDiscovery;
use crate::import_check::{ImportReport, check_imports};
use crate::normalize::PathNormalizer;
use crate::record::ExtractionRecord;
use crate::rules::RuleSet;
use crate::schema_refs::{SchemaTree, with_schema_file};
use crate::summary::{SeenRefs, SummaryOptions, SummaryRow, fold_summary};

/// What to do when a single document cannot be processed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Record a diagnostic and carry on
    #[default]
    Skip,
    /// Fail the run
    Abort,
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(ErrorPolicy::Skip),
            "abort" => Ok(ErrorPolicy::Abort),
            other => Err(format!(
                "unknown error policy '{other}' (expected 'skip' or 'abort')"
            )),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Number of object files processed concurrently
    pub max_concurrent: usize,
    pub error_policy: ErrorPolicy,
    pub layout: SchemaLayout,
    pub normalizer: PathNormalizer,
    pub summary: SummaryOptions,
    /// Entry schema key; selected automatically when absent
    pub entry: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: num_cpus::get(),
            error_policy: ErrorPolicy::default(),
            layout: SchemaLayout::default(),
            normalizer: PathNormalizer::default(),
            summary: SummaryOptions::default(),
            entry: None,
        }
    }
}

/// Outcome for one object schema
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub duration: Duration,
    /// None when the file was skipped
    pub record: Option<ExtractionRecord>,
    pub summary: Vec<SummaryRow>,
    pub skipped: Option<String>,
}

impl FileOutcome {
    fn extracted(
        path: PathBuf,
        record: ExtractionRecord,
        summary: Vec<SummaryRow>,
        duration: Duration,
    ) -> Self {
        Self {
            path,
            duration,
            record: Some(record),
            summary,
            skipped: None,
        }
    }

    fn skipped(path: PathBuf, reason: String, duration: Duration) -> Self {
        Self {
            path,
            duration,
            record: None,
            summary: Vec::new(),
            skipped: Some(reason),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

/// Timing and throughput for one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_duration: Duration,
    pub discovery_duration: Duration,
    pub reference_check_duration: Duration,
    pub extraction_duration: Duration,
    pub schema_files: usize,
    pub object_files: usize,
    pub skipped_files: usize,
    pub concurrent_tasks: usize,
}

impl RunMetrics {
    pub fn throughput_files_per_second(&self) -> f64 {
        let seconds = self.extraction_duration.as_secs_f64();
        if seconds > 0.0 {
            self.object_files as f64 / seconds
        } else {
            0.0
        }
    }
}

/// Everything one run produced
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub entry: Option<EntrySelection>,
    pub imports: Option<ImportReport>,
    /// One record per extracted object file, in file order
    pub records: Vec<ExtractionRecord>,
    /// Final detailed header
    pub columns: Vec<String>,
    pub summary: Vec<SummaryRow>,
    pub diagnostics: Vec<Diagnostic>,
    pub files: Vec<FileOutcome>,
    pub metrics: RunMetrics,
}

impl RunReport {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Runs reference checks and extraction over one input
pub struct ExtractionEngine {
    extractor: Extractor,
    config: EngineConfig,
}

impl ExtractionEngine {
    pub fn new(rules: RuleSet, config: EngineConfig) -> Self {
        Self {
            extractor: Extractor::new(rules),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Open an archive or directory and run over it.
    /// An unpacked archive is removed before this returns.
    pub async fn run(&self, input: &Path) -> Result<RunReport> {
        let unpacked = open_input(input).await?;
        self.run_unpacked(&unpacked).await
    }

    pub async fn run_unpacked(&self, input: &UnpackedInput) -> Result<RunReport> {
        let workflow_start = Instant::now();
        let mut metrics = RunMetrics {
            concurrent_tasks: self.config.max_concurrent,
            ..RunMetrics::default()
        };

        // Phase 1: discovery
        let discovery_start = Instant::now();
        let schema_root = input.schema_root(&self.config.layout)?;
        let objects_dir = input.objects_dir(&self.config.layout)?;

        let schema_files = FileDiscovery::new().discover_in(&schema_root).await?;
        let object_files = FileDiscovery::new()
            .with_max_depth(Some(0))
            .discover_in(&objects_dir)
            .await?;
        metrics.discovery_duration = discovery_start.elapsed();
        metrics.schema_files = schema_files.len();
        metrics.object_files = object_files.len();
        info!(
            schema_root = %schema_root.display(),
            schemas = schema_files.len(),
            objects = object_files.len(),
            "discovered schema files"
        );

        // Phase 2: reference closure
        let check_start = Instant::now();
        let tree = SchemaTree::from_files(
            &schema_root,
            schema_files,
            self.config.normalizer.clone(),
        );
        let (entry, imports, mut diagnostics) = self.check_references(tree).await?;
        metrics.reference_check_duration = check_start.elapsed();

        // Phase 3: per-file extraction
        let extraction_start = Instant::now();
        let files = self.process_files(object_files).await?;
        metrics.extraction_duration = extraction_start.elapsed();

        // Phase 4: assembly
        let mut records = Vec::with_capacity(files.len());
        let mut summary = Vec::new();
        for outcome in &files {
            if let Some(reason) = &outcome.skipped {
                metrics.skipped_files += 1;
                diagnostics.push(Diagnostic::SkippedFile {
                    path: outcome.path.display().to_string(),
                    reason: reason.clone(),
                });
            }
            if let Some(record) = &outcome.record {
                records.push(record.clone());
            }
            summary.extend(outcome.summary.iter().cloned());
        }
        let columns = self.extractor.layout().resolve(&records);

        for diagnostic in &diagnostics {
            warn!("{diagnostic}");
        }

        metrics.total_duration = workflow_start.elapsed();
        info!(
            records = records.len(),
            summary_rows = summary.len(),
            skipped = metrics.skipped_files,
            elapsed_ms = metrics.total_duration.as_millis() as u64,
            "extraction finished"
        );

        Ok(RunReport {
            entry,
            imports,
            records,
            columns,
            summary,
            diagnostics,
            files,
            metrics,
        })
    }

    /// Entry selection and import check, off the async runtime.
    /// Under [`ErrorPolicy::Skip`] a failure becomes a diagnostic.
    async fn check_references(
        &self,
        tree: SchemaTree,
    ) -> Result<(Option<EntrySelection>, Option<ImportReport>, Vec<Diagnostic>)> {
        let explicit = self.config.entry.clone();
        let outcome = tokio::task::spawn_blocking(move || -> Result<_> {
            let selection = match explicit {
                Some(entry) => EntrySelection::explicit(&tree, &entry)?,
                None => select_entry(&tree)?,
            };
            let report = check_imports(&tree, &selection.entry)?;
            Ok((selection, report))
        })
        .await
        .map_err(|e| ExtractError::Concurrency {
            details: format!("Reference check task failed: {}", e),
        })?;

        match outcome {
            Ok((selection, report)) => {
                debug!(entry = %selection.entry, checked = report.checks.len(), "reference check complete");
                let mut diagnostics = selection.all_diagnostics();
                diagnostics.extend(report.checks.iter().filter_map(Diagnostic::from_check));
                Ok((Some(selection), Some(report), diagnostics))
            }
            Err(e) if self.config.error_policy == ErrorPolicy::Skip => Ok((
                None,
                None,
                vec![Diagnostic::ImportCheckFailed {
                    reason: e.to_string(),
                }],
            )),
            Err(e) => Err(e),
        }
    }

    /// Extract every file concurrently; outcomes come back in input order.
    pub async fn process_files(&self, files: Vec<PathBuf>) -> Result<Vec<FileOutcome>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let semaphore = Arc::new(tokio::sync::Semaphore::new(
            self.config.max_concurrent.max(1),
        ));

        let tasks: Vec<_> = files
            .into_iter()
            .map(|path| {
                let semaphore = Arc::clone(&semaphore);
                let extractor = self.extractor.clone();
                let options = self.config.summary.clone();
                let policy = self.config.error_policy;

                tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.map_err(|_| {
                        ExtractError::Concurrency {
                            details: "Failed to acquire extraction semaphore".to_string(),
                        }
                    })?;

                    let start = Instant::now();
                    let task_path = path.clone();
                    let result = tokio::task::spawn_blocking(move || {
                        process_file(&task_path, &extractor, &options)
                    })
                    .await
                    .map_err(|e| ExtractError::Concurrency {
                        details: format!("Extraction task failed: {}", e),
                    })?;

                    match result {
                        Ok((record, summary)) => {
                            debug!(path = %path.display(), "extracted");
                            Ok(FileOutcome::extracted(path, record, summary, start.elapsed()))
                        }
                        Err(e) if policy == ErrorPolicy::Skip => Ok(FileOutcome::skipped(
                            path,
                            e.to_string(),
                            start.elapsed(),
                        )),
                        Err(e) => Err(e),
                    }
                })
            })
            .collect();

        let task_results = try_join_all(tasks)
            .await
            .map_err(|e| ExtractError::Concurrency {
                details: format!("Task join error: {}", e),
            })?;

        task_results.into_iter().collect()
    }
}

/// Parse once, then produce both the detailed record and the summary rows.
fn process_file(
    path: &Path,
    extractor: &Extractor,
    options: &SummaryOptions,
) -> Result<(ExtractionRecord, Vec<SummaryRow>)> {
    with_schema_file(path, |doc, filename| {
        let record = extractor.extract(doc, filename);
        let mut rows = Vec::new();
        fold_summary(doc, filename, &mut SeenRefs::new(), options, &mut rows);
        (record, rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CellValue;
    use std::fs;
    use tempfile::TempDir;

    const INDEX: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:include schemaLocation="objekty/budova.xsd"/>
    <xs:include schemaLocation="objekty/silnice.xsd"/>
</xs:schema>"#;

    fn object(name: &str, body: &str) -> String {
        format!(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:obj="urn:{name}" targetNamespace="urn:{name}">
    <xs:element name="{name}" type="obj:{name}Type"/>
    <xs:complexType name="{name}Type">
        <xs:sequence>{body}</xs:sequence>
    </xs:complexType>
</xs:schema>"#
        )
    }

    fn write_input<N: AsRef<str>>(files: &[(N, String)]) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = temp_dir.path().join(name.as_ref());
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        temp_dir
    }

    fn rules() -> RuleSet {
        RuleSet::from_json_str(
            r#"{"element_types": {"OblastObjektuKI": {"exist": true}, "atr:Kod": {"minOccurs": true}}}"#,
        )
        .unwrap()
    }

    fn engine(policy: ErrorPolicy) -> ExtractionEngine {
        ExtractionEngine::new(
            rules(),
            EngineConfig {
                max_concurrent: 2,
                error_policy: policy,
                ..EngineConfig::default()
            },
        )
    }

    #[test]
    fn test_error_policy_from_str() {
        assert_eq!("skip".parse::<ErrorPolicy>(), Ok(ErrorPolicy::Skip));
        assert_eq!("ABORT".parse::<ErrorPolicy>(), Ok(ErrorPolicy::Abort));
        assert!("ignore".parse::<ErrorPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_run_over_directory() {
        let input = write_input(&[
            ("xsd/index_data.xsd", INDEX.to_string()),
            (
                "xsd/objekty/silnice.xsd",
                object("Silnice", r#"<xs:element ref="atr:Kod" minOccurs="0"/>"#),
            ),
            (
                "xsd/objekty/budova.xsd",
                object(
                    "Budova",
                    r#"<xs:element name="OblastObjektuKI"/><xs:element ref="atr:Kod" minOccurs="1"/>"#,
                ),
            ),
        ]);

        let report = engine(ErrorPolicy::Skip).run(input.path()).await.unwrap();

        assert_eq!(report.entry.as_ref().unwrap().entry, "index_data.xsd");
        assert_eq!(report.imports.as_ref().unwrap().problems().count(), 0);
        assert!(report.diagnostics.is_empty());

        let filenames: Vec<_> = report.records.iter().map(|r| r.render("filename")).collect();
        assert_eq!(filenames, vec!["budova.xsd", "silnice.xsd"]);
        assert_eq!(report.records[0].get("OblastObjektuKI"), Some(&CellValue::Int(1)));
        assert_eq!(report.records[1].get("OblastObjektuKI"), Some(&CellValue::Int(0)));
        assert_eq!(report.records[1].render("Kod_minOccurs"), "0");

        assert_eq!(report.summary.len(), 2);
        assert_eq!(report.summary[0].filename, "budova.xsd");
        assert_eq!(report.metrics.object_files, 2);
        assert_eq!(report.metrics.schema_files, 3);
    }

    #[tokio::test]
    async fn test_skip_policy_records_diagnostic() {
        let input = write_input(&[
            ("xsd/index_data.xsd", INDEX.to_string()),
            ("xsd/objekty/budova.xsd", object("Budova", "")),
            ("xsd/objekty/silnice.xsd", "<xs:schema".to_string()),
        ]);

        let report = engine(ErrorPolicy::Skip).run(input.path()).await.unwrap();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.metrics.skipped_files, 1);
        assert!(report
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::SkippedFile { path, .. } if path.ends_with("silnice.xsd"))));
        // The broken file is reached from the entry, so the import check fails too
        assert!(report
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::ImportCheckFailed { .. })));
    }

    #[tokio::test]
    async fn test_abort_policy_fails_run() {
        let input = write_input(&[
            ("xsd/index.xsd", r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"/>"#.to_string()),
            ("xsd/objekty/budova.xsd", "<xs:schema".to_string()),
        ]);

        let engine = ExtractionEngine::new(
            rules(),
            EngineConfig {
                error_policy: ErrorPolicy::Abort,
                entry: Some("index.xsd".to_string()),
                ..EngineConfig::default()
            },
        );

        assert!(matches!(
            engine.run(input.path()).await,
            Err(ExtractError::SchemaParse { .. })
        ));
    }

    #[tokio::test]
    async fn test_reference_problems_become_diagnostics() {
        let input = write_input(&[
            (
                "xsd/index_data.xsd",
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:include schemaLocation="objekty/budova.xsd"/>
    <xs:import schemaLocation="chybi.xsd"/>
</xs:schema>"#
                    .to_string(),
            ),
            ("xsd/objekty/budova.xsd", object("Budova", "")),
            ("xsd/objekty/navic.xsd", object("Navic", "")),
        ]);

        let report = engine(ErrorPolicy::Skip).run(input.path()).await.unwrap();

        // navic.xsd is unreferenced, so it also competes for the entry
        assert_eq!(
            report.diagnostics,
            vec![
                Diagnostic::AmbiguousEntry {
                    chosen: "index_data.xsd".to_string(),
                    candidates: vec![
                        "index_data.xsd".to_string(),
                        "objekty/navic.xsd".to_string()
                    ],
                },
                Diagnostic::Reference {
                    path: "chybi.xsd".to_string(),
                    status: crate::import_check::ReferenceStatus::Missing
                },
                Diagnostic::Reference {
                    path: "objekty/navic.xsd".to_string(),
                    status: crate::import_check::ReferenceStatus::Unreferenced
                },
            ]
        );
        assert_eq!(report.records.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_objects_dir_is_an_error() {
        let input = write_input(&[("xsd/index.xsd", INDEX.to_string())]);

        assert!(matches!(
            engine(ErrorPolicy::Skip).run(input.path()).await,
            Err(ExtractError::LayoutNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_process_files_preserves_order() {
        let input = write_input(
            &(0..12)
                .map(|i| (format!("xsd/objekty/o{i:02}.xsd"), object(&format!("O{i}"), "")))
                .collect::<Vec<_>>(),
        );
        let files: Vec<PathBuf> = (0..12)
            .map(|i| input.path().join(format!("xsd/objekty/o{i:02}.xsd")))
            .collect();

        let outcomes = engine(ErrorPolicy::Skip)
            .process_files(files.clone())
            .await
            .unwrap();

        let paths: Vec<_> = outcomes.iter().map(|o| o.path.clone()).collect();
        assert_eq!(paths, files);
    }
}
