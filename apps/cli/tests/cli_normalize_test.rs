//! Integration tests for the `lorafy normalize` command.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

#[test]
fn test_normalize_within_budget_copies_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer.start_file("notes.txt", SimpleFileOptions::default()).unwrap();
    writer.write_all(b"hello").unwrap();
    let bytes = writer.finish().unwrap().into_inner();
    let input = temp_dir.path().join("batch_jane.zip");
    std::fs::write(&input, &bytes).unwrap();
    let output = temp_dir.path().join("out.zip");

    Command::cargo_bin("lorafy")
        .unwrap()
        .current_dir(temp_dir.path())
        .env("HOME", temp_dir.path())
        .arg("normalize")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("copied unchanged"));

    assert_eq!(std::fs::read(&output).unwrap(), bytes);
}

#[test]
fn test_normalize_rejects_zero_budget() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("batch_jane.zip");
    std::fs::write(&input, b"definitely not a zip").unwrap();

    Command::cargo_bin("lorafy")
        .unwrap()
        .current_dir(temp_dir.path())
        .env("HOME", temp_dir.path())
        .arg("normalize")
        .arg(&input)
        .args(["--output", "out.zip", "--budget-mib", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("size_budget must be > 0"));
}
