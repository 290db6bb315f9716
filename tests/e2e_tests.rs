//! End-to-end tests for the depflow CLI
//!
//! These tests verify:
//! - Scan output in text and JSON form
//! - Schedule reporting and `--respect-schedule`
//! - Configuration handling (disabled integrations, invalid values)
//! - Exit codes for success and fatal errors
//!
//! None of them reach a package registry.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const PACKAGE_JSON: &str = r#"{
  "name": "test-project",
  "version": "1.0.0",
  "dependencies": {
    "lodash": "^4.17.20"
  },
  "devDependencies": {
    "typescript": "~5.0.0"
  }
}
"#;

/// Create a test directory with one manifest per built-in integration
fn create_test_project() -> TempDir {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    fs::write(temp_dir.path().join("package.json"), PACKAGE_JSON).unwrap();
    fs::write(
        temp_dir.path().join("requirements.txt"),
        "requests==2.28.0\nDjango~=4.2\n",
    )
    .unwrap();
    fs::write(temp_dir.path().join("Dockerfile"), "FROM nginx:1.25\n").unwrap();
    temp_dir
}

fn depflow() -> Command {
    let mut cmd = Command::cargo_bin("depflow").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    depflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("schedule"));
}

#[test]
fn test_missing_subcommand_fails() {
    depflow().assert().failure();
}

#[test]
fn test_scan_text() {
    let project = create_test_project();
    depflow()
        .arg("scan")
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("package.json (npm): 2 dependencies"))
        .stdout(predicate::str::contains("requirements.txt (pip): 2 dependencies"))
        .stdout(predicate::str::contains("Dockerfile (dockerfile): 1 dependency"))
        .stdout(predicate::str::contains("3 manifests, 5 dependencies"));
}

#[test]
fn test_scan_json() {
    let project = create_test_project();
    let output = depflow()
        .args(["scan", "--json", "--only", "npm"])
        .arg(project.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["summary"]["manifests"], 1);
    assert_eq!(value["summary"]["dependencies"], 2);
    assert_eq!(value["manifests"][0]["type"], "npm");
    assert_eq!(value["manifests"][0]["dependencies"][0]["name"], "lodash");
}

#[test]
fn test_scan_quiet() {
    let project = create_test_project();
    depflow()
        .args(["scan", "-q"])
        .arg(project.path())
        .assert()
        .success()
        .stdout("3 manifests, 5 dependencies\n");
}

#[test]
fn test_disabled_integration_is_not_scanned() {
    let project = create_test_project();
    fs::write(
        project.path().join(".depflow.yml"),
        "integrations:\n  pip:\n    enabled: false\n",
    )
    .unwrap();

    depflow()
        .arg("scan")
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("requirements.txt").not())
        .stdout(predicate::str::contains("2 manifests"));
}

#[test]
fn test_match_config_excludes_manifests() {
    let project = create_test_project();
    fs::create_dir_all(project.path().join("fixtures")).unwrap();
    fs::write(project.path().join("fixtures/package.json"), PACKAGE_JSON).unwrap();
    fs::write(
        project.path().join(".depflow.toml"),
        "[integrations.npm]\nexclude = [\"fixtures/**\"]\n",
    )
    .unwrap();

    depflow()
        .args(["scan", "--only", "npm", "-q"])
        .arg(project.path())
        .assert()
        .success()
        .stdout("1 manifest, 2 dependencies\n");
}

#[test]
fn test_plan_without_selected_integrations() {
    let project = create_test_project();
    depflow()
        .args(["plan", "--only", "helm"])
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No updates"));
}

#[test]
fn test_invalid_config_is_fatal() {
    let project = create_test_project();
    fs::write(project.path().join(".depflow.yml"), "concurrency: 0\n").unwrap();

    depflow()
        .arg("scan")
        .arg(project.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("concurrency"));
}

#[test]
fn test_invalid_update_level_is_rejected() {
    let project = create_test_project();
    depflow()
        .args(["plan", "--update-level", "everything"])
        .arg(project.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid update level"));
}

#[test]
fn test_schedule_without_config() {
    let project = create_test_project();
    depflow()
        .arg("schedule")
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No schedule configured"));
}

#[test]
fn test_schedule_json() {
    let project = create_test_project();
    fs::write(
        project.path().join(".depflow.yml"),
        "schedule:\n  interval: weekly\n  day: friday\n  timezone: Europe/Berlin\n",
    )
    .unwrap();

    let output = depflow()
        .args(["schedule", "--json"])
        .arg(project.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["configured"], true);
    assert_eq!(value["timezone"], "Europe/Berlin");
    assert!(value["next_run"].is_string());
}

#[test]
fn test_respect_schedule_skips_update() {
    let project = create_test_project();
    // February 31st never comes
    fs::write(
        project.path().join(".depflow.yml"),
        "schedule:\n  interval: cron\n  cron: \"0 0 31 2 *\"\n",
    )
    .unwrap();

    depflow()
        .args(["update", "--respect-schedule"])
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("not due"));

    let package_json = fs::read_to_string(project.path().join("package.json")).unwrap();
    assert_eq!(package_json, PACKAGE_JSON);
}
