mod common;

use common::test_helpers::*;
use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

fn xsd_extract(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xsd-extract"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

fn path_str(path: &std::path::Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_cli_help_output() {
    let output = xsd_extract(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("--input"));
    assert!(stdout.contains("--rules"));
    assert!(stdout.contains("--detailed"));
    assert!(stdout.contains("--summary"));
    assert!(stdout.contains("--fail-fast"));
}

#[test]
fn test_cli_missing_input_error() {
    let temp_dir = TempDir::new().unwrap();
    let rules = write_rules(temp_dir.path(), RULES_JSON);

    let output = xsd_extract(&[
        "--input",
        "/nonexistent/balik.zip",
        "--rules",
        path_str(&rules),
    ]);

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Input does not exist"));
}

#[test]
fn test_cli_conflicting_options() {
    let output = xsd_extract(&["-i", "a.zip", "-r", "rules.json", "--verbose", "--quiet"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("cannot be used with"));
}

#[test]
fn test_cli_writes_both_tables_from_zip() {
    let work_dir = TempDir::new().unwrap();
    let archive = SchemaPackage::sample().write_zip(work_dir.path(), None);
    let rules = write_rules(work_dir.path(), RULES_JSON);
    let detailed = work_dir.path().join("detailed.csv");
    let summary = work_dir.path().join("summary.csv");

    let output = xsd_extract(&[
        "-i",
        path_str(&archive),
        "-r",
        path_str(&rules),
        "-d",
        path_str(&detailed),
        "-s",
        path_str(&summary),
        "-t",
        "2",
    ]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Extraction Summary:"));
    assert!(stdout.contains("Records: 2"));
    assert!(stdout.contains("chybi/chybi.xsd"));

    let detailed = fs::read_to_string(detailed).unwrap();
    let detailed_lines: Vec<_> = detailed.lines().collect();
    assert_eq!(detailed_lines.len(), 3);
    assert!(detailed_lines[0].starts_with("filename,namespace,name,type,poznamka,OblastObjektuKI"));
    assert!(detailed_lines[1].starts_with("budova.xsd,"));
    assert!(detailed_lines[2].starts_with("silnice.xsd,"));

    let summary = fs::read_to_string(summary).unwrap();
    let summary_lines: Vec<_> = summary.lines().collect();
    assert_eq!(summary_lines[0], "filename,name,minOccurs");
    assert_eq!(summary_lines.len(), 5);
}

#[test]
fn test_cli_fail_fast_on_broken_object() {
    let package = SchemaPackage::sample().file("xsd/objekty/rozbity.xsd", MALFORMED_XSD);
    let input = package.write_dir();
    let rules = write_rules(input.path(), RULES_JSON);

    let skipped = xsd_extract(&["-i", path_str(input.path()), "-r", path_str(&rules)]);
    assert!(skipped.status.success());
    assert!(String::from_utf8(skipped.stdout).unwrap().contains("Skipped: 1"));

    let aborted = xsd_extract(&[
        "-i",
        path_str(input.path()),
        "-r",
        path_str(&rules),
        "--fail-fast",
    ]);
    assert!(!aborted.status.success());
    assert!(String::from_utf8(aborted.stderr).unwrap().contains("rozbity.xsd"));
}

#[test]
fn test_cli_settings_file_layout() {
    let input = SchemaPackage::new()
        .file("schemas/index.xsd", INDEX_XSD)
        .file("schemas/objects/budova.xsd", BUDOVA_XSD)
        .write_dir();
    let rules = write_rules(input.path(), RULES_JSON);
    let settings = input.path().join("settings.toml");
    fs::write(
        &settings,
        "[layout]\nschema_dir = \"schemas\"\nobjects_dir = \"objects\"\nroot_prefix = \"schemas\"\n",
    )
    .unwrap();
    let detailed = input.path().join("out.csv");

    let output = xsd_extract(&[
        "-i",
        path_str(input.path()),
        "-r",
        path_str(&rules),
        "-c",
        path_str(&settings),
        "-d",
        path_str(&detailed),
        "-q",
    ]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let table = fs::read_to_string(detailed).unwrap();
    assert_eq!(table.lines().count(), 2);
    assert!(table.lines().nth(1).unwrap().starts_with("budova.xsd,"));
}
