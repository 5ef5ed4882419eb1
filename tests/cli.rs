//! CLI test cases.
//!
//! These run the whole pipeline against the fixture scans. The `sidecar`
//! engine makes extraction deterministic, so we can assert on exact totals;
//! the `mock` engine fabricates data, so we only assert on its shape.

use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;

/// Create a new `Command` with our binary.
fn cmd() -> Command {
    Command::cargo_bin("invoice-digitizer").unwrap()
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_schema_invoice() {
    cmd()
        .args(["schema", "Invoice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("invoice_number"));
}

#[test]
fn test_extract_with_sidecar_engine() {
    cmd()
        .arg("extract")
        .arg("tests/fixtures/scans/input.jsonl")
        .args(["--engine", "sidecar"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"ok\""))
        .stdout(predicate::str::contains("\"tax\":153.75"))
        .stdout(predicate::str::contains("\"total\":2203.75"));
}

#[test]
fn test_extract_mock_csv_input_to_csv_file() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("out.csv");
    cmd()
        .arg("extract")
        .arg("tests/fixtures/scans/input.csv")
        .args(["--format", "csv"])
        .arg("-o")
        .arg(&out_path)
        .assert()
        .success();

    let out = std::fs::read_to_string(&out_path).unwrap();
    assert!(out.contains("invoice_number"));
    // The mock engine brands the invoice number with the file stem.
    assert!(out.contains("INV-ACME-"));
}

#[test]
fn test_extract_rejects_unsupported_files() {
    // One record, one failure: over the default allowed failure rate.
    cmd()
        .arg("extract")
        .arg("tests/fixtures/scans/unsupported.jsonl")
        .assert()
        .failure();

    // With failures allowed, the record is reported in place instead.
    cmd()
        .arg("extract")
        .arg("tests/fixtures/scans/unsupported.jsonl")
        .args(["--allowed-failure-rate", "1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"failed\""))
        .stdout(predicate::str::contains("File type not supported"));
}

#[test]
fn test_revise_applies_edits() {
    cmd()
        .arg("revise")
        .arg("tests/fixtures/invoices.jsonl")
        .args(["--edits", "tests/fixtures/edits.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"edits_applied\":2"))
        .stdout(predicate::str::contains("Acme Corp LLC"))
        // Quantity 2 -> 3 on the first item: subtotal 2650, tax untouched.
        .stdout(predicate::str::contains("\"subtotal\":2650.0"))
        .stdout(predicate::str::contains("\"total\":2803.75"));
}

#[test]
fn test_revise_without_edits_passes_records_through() {
    cmd()
        .arg("revise")
        .arg("tests/fixtures/invoices.jsonl")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"edits_applied\":0"))
        .stdout(predicate::str::contains("\"total\":2203.75"));
}

#[test]
fn test_render_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let records_path = dir.path().join("records.jsonl");
    cmd()
        .arg("render")
        .arg("tests/fixtures/invoices.jsonl")
        .arg("--out-dir")
        .arg(dir.path())
        .arg("-o")
        .arg(&records_path)
        .assert()
        .success();

    for name in [
        "INV-2023-0158.json",
        "INV-2023-0158.pdf",
        "INV-2023-0158-qr.png",
        "batch-report.pdf",
    ] {
        assert!(dir.path().join(name).exists(), "missing artifact {name}");
    }
    let records = std::fs::read_to_string(&records_path).unwrap();
    assert!(records.contains("\"status\":\"ok\""));
}

#[test]
fn test_full_pipeline_via_stdio() {
    use std::io::Write as _;
    use std::process::Stdio;

    // extract | revise, with the revise step reading the extract output from
    // standard input.
    let extracted = cmd()
        .arg("extract")
        .arg("tests/fixtures/scans/input.jsonl")
        .args(["--engine", "sidecar"])
        .output()
        .unwrap();
    assert!(extracted.status.success());

    let mut revise = cmd()
        .arg("revise")
        .args(["--edits", "tests/fixtures/edits.toml"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    revise
        .stdin
        .take()
        .unwrap()
        .write_all(&extracted.stdout)
        .unwrap();
    let revised = revise.wait_with_output().unwrap();
    assert!(revised.status.success());
    let stdout = String::from_utf8(revised.stdout).unwrap();
    assert!(stdout.contains("Acme Corp LLC"));
    assert!(stdout.contains("\"total\":2803.75"));
}
