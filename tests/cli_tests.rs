//! CLI integration tests
//!
//! These tests run the `spi-validate` binary against the bundled schemas.

#![cfg(feature = "cli")]

mod common;

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use common::*;
use tempfile::TempDir;

fn spi_validate(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_spi-validate"))
        .args(args)
        .env("SPI_SCHEMA_DIR", schemas_dir())
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

fn write(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

fn fixture(name: &str) -> String {
    fixtures_dir().join(name).to_string_lossy().into_owned()
}

// ============================================================================
// Detect
// ============================================================================

#[test]
fn test_cli_detect() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "pacs004.xml", &pacs004());

    let output = spi_validate(&["detect", &file]);
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["family"], "pacs.004");
    assert_eq!(json["version"], "1.5");
}

// ============================================================================
// Sign and validate
// ============================================================================

#[test]
fn test_cli_sign_then_validate() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "pacs008.xml", &pacs008());
    let signed = dir.path().join("signed.xml");
    let signed = signed.to_string_lossy().into_owned();

    let output = spi_validate(&[
        "sign",
        &input,
        "--key",
        &fixture("key.pem"),
        "--certificate",
        &fixture("cert.pem"),
        "--output",
        &signed,
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(Path::new(&signed).exists());

    let output = spi_validate(&["validate", &signed, "--certificate", &fixture("cert.pem")]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stdout));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["valid"], true);
    assert_eq!(json["signature"]["details"]["signatureCount"], 1);
}

#[test]
fn test_cli_sign_with_pkcs1_key_to_stdout() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "pacs002.xml", &pacs002());

    let output = spi_validate(&[
        "sign",
        &input,
        "--key",
        &fixture("key_pkcs1.pem"),
        "--certificate",
        &fixture("cert.pem"),
        "--key-info-id",
        "ki-1",
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(r#"<KeyInfo Id="ki-1">"#));
}

#[test]
fn test_cli_validate_failure_exit_code() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "pacs002.xml", &pacs002());

    let output = spi_validate(&["validate", &file]);
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["valid"], false);
    assert_eq!(json["structural"]["ok"], true);

    let output = spi_validate(&["validate", &file, "--no-signature", "--pretty"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("\n  \"valid\": true"));
}

#[test]
fn test_cli_missing_file() {
    let output = spi_validate(&["validate", "/nonexistent/message.xml"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error:"));
}

#[test]
fn test_cli_schema_dir_flag_overrides_environment() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "pacs002.xml", &pacs002());
    let empty = dir.path().to_string_lossy().into_owned();

    let output = spi_validate(&["--schema-dir", &empty, "validate", &file, "--no-signature"]);
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let message = json["structural"]["issues"][0]["message"].as_str().unwrap();
    assert!(message.starts_with("No schema available for pacs.002 1.14"));
}
