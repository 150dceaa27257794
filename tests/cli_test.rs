//! Binary-level tests for the `planguard` command

mod common;

use common::TestPlan;
use serde_json::Value;
use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

fn planguard(dir: &TempDir, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_planguard"));
    cmd.args(args).current_dir(dir.path()).env("RUST_LOG", "error");
    for key in [
        "PLANGUARD_REGION",
        "PLANGUARD_DEADLINE_SECS",
        "PLANGUARD_ENFORCEMENT",
        "PLANGUARD_LLM_API_BASE",
        "PLANGUARD_LLM_API_KEY",
        "PLANGUARD_GUARDRAIL_ID",
        "PLANGUARD_MAX_SEGMENT_CHARS",
        "PLANGUARD_HOURS_PER_MONTH",
    ] {
        cmd.env_remove(key);
    }
    cmd.output().unwrap()
}

fn write_plan(dir: &TempDir, contents: &str) -> String {
    let path = dir.path().join("plan.json");
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_analyze_json_output() {
    let dir = TempDir::new().unwrap();
    let plan = TestPlan::new()
        .bucket("logs", None, None)
        .security_group("bastion", 22, 22, "0.0.0.0/0");
    let path = write_plan(&dir, &plan.json());

    let output = planguard(&dir, &["analyze", &path, "--json", "--region", "eu-west-1"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let result: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["status"], "passed");
    assert_eq!(result["partial"], false);
    let ids: Vec<&str> = result["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["outcome_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["plan-summary", "impact-analysis", "compute-summary"]);
}

#[test]
fn test_analyze_text_output() {
    let dir = TempDir::new().unwrap();
    let path = write_plan(&dir, &TestPlan::new().bucket("logs", Some(true), Some("AES256")).json());

    let output = planguard(&dir, &["analyze", &path]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("passed: Analysis complete"));
    assert!(stdout.contains("# 🔍 Impact-Analysis"));
    assert!(stdout.contains("All Clear"));
}

#[test]
fn test_mandatory_enforcement_sets_exit_code() {
    let dir = TempDir::new().unwrap();
    let path = write_plan(&dir, &TestPlan::new().bucket("logs", None, None).json());

    let output = Command::new(env!("CARGO_BIN_EXE_planguard"))
        .args(["analyze", &path, "--json"])
        .current_dir(dir.path())
        .env("PLANGUARD_ENFORCEMENT", "mandatory")
        .env_remove("PLANGUARD_LLM_API_BASE")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let result: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["status"], "failed");
}

#[test]
fn test_unparseable_plan_degrades_to_passed() {
    let dir = TempDir::new().unwrap();
    let path = write_plan(&dir, "{ this is not json");

    let output = planguard(&dir, &["analyze", &path, "--json"]);
    assert!(output.status.success());

    let result: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["status"], "passed");
    assert!(result["message"].as_str().unwrap().starts_with("Analysis skipped"));
}

#[test]
fn test_missing_plan_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let output = planguard(&dir, &["analyze", "does-not-exist.json"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read plan file"));
}

#[test]
fn test_tools_lists_validator_specs() {
    let dir = TempDir::new().unwrap();
    let output = planguard(&dir, &["tools"]);
    assert!(output.status.success());

    let specs: Vec<Value> = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = specs
        .iter()
        .map(|s| s["toolSpec"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["EC2Validator", "S3Validator", "SecurityGroupValidator", "CostEstimator"]);
    assert_eq!(specs[0]["toolSpec"]["inputSchema"]["json"]["type"], "object");
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_planguard"))
        .arg("tools")
        .current_dir(dir.path())
        .env("PLANGUARD_DEADLINE_SECS", "soon")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid configuration"));
}
