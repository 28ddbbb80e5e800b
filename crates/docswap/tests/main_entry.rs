//! Integration tests for the `docswap` binary entry point.
//!
//! Verifies a complete run over a real package and the user-facing errors
//! for unusable configuration.

use std::fs;

use anyhow::{Context, Result, ensure};
use assert_cmd::cargo::cargo_bin_cmd;
use docswap_engine::ooxml::fixtures::{DocxFixture, is_package, read_part};
use predicates::str::contains;

#[test]
fn batch_run_edits_documents_and_prints_summary() -> Result<()> {
    let root = tempfile::tempdir().context("create temp dir")?;
    let source = root.path().join("in");
    let output = root.path().join("out");
    fs::create_dir_all(&source).context("create source")?;
    DocxFixture::new()
        .paragraph(&["Budget ", "2019"])
        .write(&source.join("budget.docx"))
        .context("write document")?;

    let mut command = cargo_bin_cmd!("docswap");
    command
        .arg("--source-dir")
        .arg(&source)
        .arg("--output-dir")
        .arg(&output)
        .arg("--temp-root")
        .arg(root.path())
        .arg("--rules")
        .arg("2019=2023");
    command
        .assert()
        .success()
        .stdout(contains("budget.docx"))
        .stdout(contains("replacements: 1"));

    let edited = output.join("budget.docx");
    ensure!(is_package(&edited), "output is not a zip package");
    let body = read_part(&edited, "word/document.xml")
        .context("read edited body")?;
    ensure!(body.contains("2023"), "replacement missing from {body}");
    ensure!(!body.contains("2019"), "search text left in {body}");
    Ok(())
}

#[test]
fn rerun_overwrites_existing_outputs_without_asking() -> Result<()> {
    let root = tempfile::tempdir().context("create temp dir")?;
    let source = root.path().join("in");
    let output = root.path().join("out");
    fs::create_dir_all(&source).context("create source")?;
    DocxFixture::new()
        .paragraph(&["Budget 2019"])
        .write(&source.join("budget.docx"))
        .context("write document")?;
    DocxFixture::new()
        .paragraph(&["Macro 2019"])
        .write(&source.join("macro.docm"))
        .context("write macro-enabled document")?;

    let run = || {
        let mut command = cargo_bin_cmd!("docswap");
        command
            .arg("--source-dir")
            .arg(&source)
            .arg("--output-dir")
            .arg(&output)
            .arg("--temp-root")
            .arg(root.path())
            .arg("--rules")
            .arg("2019=2023")
            .write_stdin("");
        command
    };
    run()
        .assert()
        .success()
        .stdout(contains("replacements: 2"))
        .stdout(contains("skipped: 0"));

    DocxFixture::new()
        .paragraph(&["Forecast 2019"])
        .write(&source.join("budget.docx"))
        .context("rewrite document")?;
    run()
        .assert()
        .success()
        .stdout(contains("replacements: 2"))
        .stdout(contains("skipped: 0"));

    let body = read_part(&output.join("budget.docx"), "word/document.xml")
        .context("read rerun body")?;
    ensure!(body.contains("Forecast 2023"), "second run did not overwrite: {body}");
    let macro_body = read_part(&output.join("macro.docm"), "word/document.xml")
        .context("read macro-enabled body")?;
    ensure!(macro_body.contains("Macro 2023"), "macro-enabled document not edited: {macro_body}");
    Ok(())
}

#[test]
fn missing_source_directory_exits_with_failure() {
    let root = tempfile::tempdir().expect("temp dir");

    let mut command = cargo_bin_cmd!("docswap");
    command
        .arg("--source-dir")
        .arg(root.path().join("absent"))
        .arg("--output-dir")
        .arg(root.path().join("out"))
        .arg("--rules")
        .arg("2019=2023");
    command
        .assert()
        .failure()
        .stderr(contains("cannot list source directory"));
}

#[test]
fn malformed_rule_exits_with_failure() {
    let root = tempfile::tempdir().expect("temp dir");

    let mut command = cargo_bin_cmd!("docswap");
    command
        .arg("--source-dir")
        .arg(root.path())
        .arg("--output-dir")
        .arg(root.path().join("out"))
        .arg("--rules")
        .arg("no-separator");
    command.assert().failure();
}
