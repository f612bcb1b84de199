//! Integration tests for the `lorafy train` command.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// A `lorafy` command isolated from the user's config and environment.
fn lorafy(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("lorafy").unwrap();
    cmd.current_dir(home).env("HOME", home);
    for var in [
        "REPLICATE_API_TOKEN",
        "LORAFY_MODEL_NAME",
        "LORAFY_MODEL_VERSION",
        "LORAFY_OWNER",
        "LORAFY_BASE_URL",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn write_zip(dir: &TempDir, name: &str) -> PathBuf {
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer.start_file("img1.png", SimpleFileOptions::default()).unwrap();
    writer.write_all(b"image bytes").unwrap();
    let bytes = writer.finish().unwrap().into_inner();

    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn test_train_help() {
    let temp_dir = TempDir::new().unwrap();
    lorafy(temp_dir.path())
        .args(["train", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_train_rejects_non_zip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("photos_janedoe.tar");
    std::fs::write(&path, b"not a zip").unwrap();

    lorafy(temp_dir.path())
        .arg("train")
        .arg(&path)
        .arg("--dry-run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Expected a .zip archive"));
}

#[test]
fn test_train_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    lorafy(temp_dir.path())
        .args(["train", "missing_janedoe.zip", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read archive"));
}

#[test]
fn test_train_requires_api_token() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_zip(&temp_dir, "batch1_janedoe.zip");

    lorafy(temp_dir.path())
        .arg("train")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("REPLICATE_API_TOKEN"));
}

#[test]
fn test_train_dry_run_prints_model_url() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_zip(&temp_dir, "batch1_JaneDoe.zip");

    lorafy(temp_dir.path())
        .arg("train")
        .arg(&path)
        .arg("--dry-run")
        .env("LORAFY_OWNER", "acme")
        .assert()
        .success()
        .stdout(predicate::str::contains("Training succeeded"))
        .stdout(predicate::str::contains("acme/janedoe_flux_lora"))
        .stdout(predicate::str::contains("https://dry-run.invalid/acme/janedoe_flux_lora"));
}

#[test]
fn test_train_dry_run_json_output() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_zip(&temp_dir, "batch1_janedoe.zip");

    let assert = lorafy(temp_dir.path())
        .arg("train")
        .arg(&path)
        .args(["--dry-run", "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();

    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("train --json output should be valid JSON");
    assert_eq!(json["outcome"], "succeeded");
    assert_eq!(json["identifier"], "janedoe");
    assert_eq!(json["destination"], "dry-run/janedoe_flux_lora");
    assert_eq!(json["job_id"], "dry-run-training-1");
}

#[test]
fn test_train_invalid_identifier() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_zip(&temp_dir, "prefix_.zip");

    lorafy(temp_dir.path())
        .arg("train")
        .arg(&path)
        .arg("--dry-run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("name is empty"));
}
