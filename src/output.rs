//! Table writers and the human-readable run summary.

use std::io;
use std::path::Path;
use std::time::Duration;

use crate::cli::VerbosityLevel;
use crate::diagnostics::Diagnostic;
use crate::engine::{RunMetrics, RunReport};
use crate::entry::SelectionKind;
use crate::error::Result;
use crate::import_check::ReferenceStatus;
use crate::record::ExtractionRecord;
use crate::summary::{SUMMARY_COLUMNS, SummaryRow};

/// Write the detailed table: one row per record, cells in `columns` order.
pub fn write_detailed<W: io::Write>(
    writer: W,
    columns: &[String],
    records: &[ExtractionRecord],
) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(columns)?;
    for record in records {
        csv.write_record(columns.iter().map(|column| record.render(column)))?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the summary table
pub fn write_summary<W: io::Write>(writer: W, rows: &[SummaryRow]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(SUMMARY_COLUMNS)?;
    for row in rows {
        csv.write_record(row.to_record())?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_detailed_file(
    path: &Path,
    columns: &[String],
    records: &[ExtractionRecord],
) -> Result<()> {
    write_detailed(std::fs::File::create(path)?, columns, records)
}

pub fn write_summary_file(path: &Path, rows: &[SummaryRow]) -> Result<()> {
    write_summary(std::fs::File::create(path)?, rows)
}

/// Simple output formatter for human-readable results
pub struct Output {
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    /// Formatter with colors off, for piping and tests
    pub fn plain(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_colors: false,
        }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn format_report(&self, report: &RunReport) -> String {
        let mut output = String::new();

        match self.verbosity {
            VerbosityLevel::Quiet => {
                if report.metrics.skipped_files > 0 {
                    output.push_str(&format!(
                        "Skipped: {}\n",
                        report.metrics.skipped_files
                    ));
                }
            }
            VerbosityLevel::Normal | VerbosityLevel::Verbose => {
                output.push_str(&self.format_summary(report));

                if report.has_diagnostics() {
                    output.push('\n');
                    output.push_str(&self.format_diagnostics(&report.diagnostics));
                }

                if self.verbosity == VerbosityLevel::Verbose {
                    output.push_str(&self.format_metrics(&report.metrics));
                }
            }
        }

        output
    }

    fn format_summary(&self, report: &RunReport) -> String {
        let mut output = String::new();
        output.push_str("Extraction Summary:\n");

        if let Some(selection) = &report.entry {
            let how = match selection.kind {
                SelectionKind::Explicit => "given",
                SelectionKind::Unique => "detected",
                SelectionKind::Ambiguous { .. } => "first of several candidates",
                SelectionKind::Fallback => "fallback",
            };
            output.push_str(&format!("  Entry schema: {} ({})\n", selection.entry, how));
        }

        if let Some(imports) = &report.imports {
            output.push_str(&format!(
                "  References: {} {}",
                self.colorize("OK:", "32"),
                imports.count(ReferenceStatus::Ok)
            ));
            let missing = imports.count(ReferenceStatus::Missing);
            if missing > 0 {
                output.push_str(&format!(" {} {}", self.colorize("Missing:", "31"), missing));
            }
            let unreferenced = imports.count(ReferenceStatus::Unreferenced);
            if unreferenced > 0 {
                output.push_str(&format!(
                    " {} {}",
                    self.colorize("Unreferenced:", "33"),
                    unreferenced
                ));
            }
            output.push('\n');
        }

        output.push_str(&format!(
            "  Object files: {}\n",
            report.metrics.object_files
        ));
        output.push_str(&format!("  Records: {}\n", report.records.len()));
        output.push_str(&format!("  Summary rows: {}\n", report.summary.len()));
        if report.metrics.skipped_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Skipped:", "36"),
                report.metrics.skipped_files
            ));
        }
        output.push_str(&format!(
            "  Duration: {}\n",
            format_duration(report.metrics.total_duration)
        ));

        output
    }

    fn format_diagnostics(&self, diagnostics: &[Diagnostic]) -> String {
        let mut output = format!("{}\n", self.colorize("Warnings:", "33"));
        for diagnostic in diagnostics {
            output.push_str(&format!("  {}\n", diagnostic));
        }
        output
    }

    fn format_metrics(&self, metrics: &RunMetrics) -> String {
        let mut output = String::new();
        output.push_str("\nPerformance Metrics:\n");
        output.push_str(&format!(
            "  Discovery: {}\n",
            format_duration(metrics.discovery_duration)
        ));
        output.push_str(&format!(
            "  Reference check: {}\n",
            format_duration(metrics.reference_check_duration)
        ));
        output.push_str(&format!(
            "  Extraction: {}\n",
            format_duration(metrics.extraction_duration)
        ));
        output.push_str(&format!(
            "  Throughput: {:.1} files/sec\n",
            metrics.throughput_files_per_second()
        ));
        output.push_str(&format!(
            "  Concurrent tasks: {}\n",
            metrics.concurrent_tasks
        ));
        output
    }
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntrySelection;
    use crate::import_check::{ImportReport, ReferenceCheck};
    use crate::record::CellValue;

    fn record(cells: &[(&str, CellValue)]) -> ExtractionRecord {
        let mut record = ExtractionRecord::new();
        for (name, value) in cells {
            record.set(name, value.clone());
        }
        record
    }

    fn csv_text(write: impl FnOnce(&mut Vec<u8>)) -> String {
        let mut buffer = Vec::new();
        write(&mut buffer);
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_detailed_table_renders_lists_and_gaps() {
        let columns: Vec<String> = ["filename", "Foo", "Foo_minOccurs", "geometry"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let records = vec![
            record(&[
                ("filename", CellValue::from("a.xsd")),
                ("Foo", CellValue::Int(1)),
                (
                    "Foo_minOccurs",
                    CellValue::List(vec!["0".to_string(), "1".to_string()]),
                ),
                ("geometry", CellValue::List(vec!["gml:Point".to_string()])),
            ]),
            record(&[("filename", CellValue::from("b.xsd")), ("Foo", CellValue::Int(0))]),
        ];

        let text = csv_text(|buffer| write_detailed(buffer, &columns, &records).unwrap());
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "filename,Foo,Foo_minOccurs,geometry");
        assert_eq!(lines[1], r#"a.xsd,1,"[""0"",""1""]","[""gml:Point""]""#);
        assert_eq!(lines[2], "b.xsd,0,,");
    }

    #[test]
    fn test_summary_table() {
        let rows = vec![
            SummaryRow {
                filename: "a.xsd".to_string(),
                name: "atr:Kod".to_string(),
                min_occurs: Some("0".to_string()),
            },
            SummaryRow {
                filename: "a.xsd".to_string(),
                name: r#"["gml:Point"]"#.to_string(),
                min_occurs: None,
            },
        ];

        let text = csv_text(|buffer| write_summary(buffer, &rows).unwrap());
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "filename,name,minOccurs");
        assert_eq!(lines[1], "a.xsd,atr:Kod,0");
        assert_eq!(lines[2], r#"a.xsd,"[""gml:Point""]","#);
    }

    fn report() -> RunReport {
        RunReport {
            entry: Some(EntrySelection {
                entry: "index_data.xsd".to_string(),
                kind: SelectionKind::Unique,
                diagnostics: Vec::new(),
            }),
            imports: Some(ImportReport {
                entry: "index_data.xsd".to_string(),
                checks: vec![
                    ReferenceCheck {
                        path: "objekty/a.xsd".to_string(),
                        status: ReferenceStatus::Ok,
                    },
                    ReferenceCheck {
                        path: "chybi.xsd".to_string(),
                        status: ReferenceStatus::Missing,
                    },
                ],
            }),
            diagnostics: vec![Diagnostic::Reference {
                path: "chybi.xsd".to_string(),
                status: ReferenceStatus::Missing,
            }],
            metrics: RunMetrics {
                total_duration: Duration::from_millis(120),
                object_files: 1,
                ..RunMetrics::default()
            },
            ..RunReport::default()
        }
    }

    #[test]
    fn test_output_summary() {
        let formatted = Output::plain(VerbosityLevel::Normal).format_report(&report());

        assert!(formatted.contains("Extraction Summary:"));
        assert!(formatted.contains("Entry schema: index_data.xsd (detected)"));
        assert!(formatted.contains("References: OK: 1 Missing: 1"));
        assert!(formatted.contains("chybi.xsd → Missing"));
        assert!(!formatted.contains("Performance Metrics"));
    }

    #[test]
    fn test_verbose_adds_metrics_and_quiet_is_silent() {
        let verbose = Output::plain(VerbosityLevel::Verbose).format_report(&report());
        assert!(verbose.contains("Performance Metrics:"));

        let quiet = Output::plain(VerbosityLevel::Quiet).format_report(&report());
        assert!(quiet.is_empty());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30.0s");
    }
}
