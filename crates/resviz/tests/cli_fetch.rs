//! End-to-end tests of the resviz binary that need no cloud access

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn resviz(cache_dir: &Path, log_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("resviz").unwrap();
    cmd.env("RESVIZ_CACHE_DIR", cache_dir)
        .env("RESVIZ_LOG_DIR", log_dir)
        .env_remove("RESVIZ_CONFIG")
        .env_remove("RESVIZ_RUN_MODE")
        .env_remove("RESVIZ_LIVENESS_PROBE");
    cmd
}

const RUNNING_RECORD: &str = r#"{
  "services": ["EC2"],
  "region": "us-east-1",
  "profile": "sandbox",
  "status": "running",
  "start_time": "2026-01-01T00:00:00Z",
  "pid": 1
}"#;

#[test]
fn test_fetch_rejects_duplicate_run() {
    let tmp = TempDir::new().unwrap();
    let cache_dir = tmp.path().join("cache");
    let log_dir = tmp.path().join("logs");
    let status_dir = cache_dir.join("status");
    fs::create_dir_all(&status_dir).unwrap();
    let record = status_dir.join("status_sandbox_us-east-1.json");
    fs::write(&record, RUNNING_RECORD).unwrap();

    resviz(&cache_dir, &log_dir)
        .args([
            "fetch",
            "--services",
            "EC2",
            "--region",
            "us-east-1",
            "--profile",
            "sandbox",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""success":false"#))
        .stdout(predicate::str::contains("already running"));

    assert_eq!(fs::read_to_string(&record).unwrap(), RUNNING_RECORD);
    let today = chrono::Utc::now().format("%Y-%m-%d");
    let log = fs::read_to_string(log_dir.join(format!("batch_execution.{today}.log"))).unwrap();
    assert!(log.contains("already running"));
    assert!(log.contains("Batch report"));
}

#[test]
fn test_fetch_rejects_unknown_service() {
    let tmp = TempDir::new().unwrap();
    resviz(&tmp.path().join("cache"), &tmp.path().join("logs"))
        .args(["fetch", "--services", "DynamoDB"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("DynamoDB"));
}

#[test]
fn test_partial_cache_clear_is_a_usage_error() {
    let tmp = TempDir::new().unwrap();
    resviz(&tmp.path().join("cache"), &tmp.path().join("logs"))
        .args(["cache", "clear", "--service", "EC2"])
        .assert()
        .code(2);
}

#[test]
fn test_status_json_for_unknown_scope() {
    let tmp = TempDir::new().unwrap();
    resviz(&tmp.path().join("cache"), &tmp.path().join("logs"))
        .args(["status", "--region", "eu-west-1", "--profile", "demo", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status": "ok""#))
        .stdout(predicate::str::contains("not_found"));
}

#[test]
fn test_cache_size_on_empty_cache() {
    let tmp = TempDir::new().unwrap();
    resviz(&tmp.path().join("cache"), &tmp.path().join("logs"))
        .args(["cache", "size"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("0 file(s)"));
}

#[test]
fn test_invalid_environment_override_exits_with_config_error() {
    let tmp = TempDir::new().unwrap();
    resviz(&tmp.path().join("cache"), &tmp.path().join("logs"))
        .env("RESVIZ_CACHE_TTL", "forever")
        .args(["cache", "size"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("RESVIZ_CACHE_TTL"));
}
