//! Integration tests for the execution status store

use indexmap::IndexMap;
use resviz_core::Scope;
use resviz_state::{JobState, RunSummary, StatusKind, StatusStore};
use tempfile::TempDir;

fn sandbox() -> Scope {
    Scope::new("us-east-1", Some("sandbox".to_string()))
}

fn services() -> Vec<String> {
    vec!["EC2".to_string(), "S3".to_string()]
}

fn summary() -> RunSummary {
    let mut results = IndexMap::new();
    results.insert("EC2".to_string(), 3);
    results.insert("S3".to_string(), 0);
    RunSummary::from_counts(services(), "us-east-1", results)
}

#[tokio::test]
async fn test_missing_record_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let store = StatusStore::new(tmp.path().join("status"));

    assert!(store.info(&sandbox()).await.is_none());
    assert!(!store.is_running(&sandbox()).await);
}

#[tokio::test]
async fn test_lifecycle_running_then_completed() {
    let tmp = TempDir::new().unwrap();
    let store = StatusStore::new(tmp.path());

    store.start(&services(), &sandbox(), 1234).await;
    assert!(store.is_running(&sandbox()).await);
    let record = store.info(&sandbox()).await.unwrap();
    assert_eq!(record.kind(), StatusKind::Running);
    assert_eq!(record.pid(), Some(1234));
    assert_eq!(record.services, services());
    assert_eq!(record.profile.as_deref(), Some("sandbox"));

    store.finish_success(&services(), &sandbox(), summary()).await;
    assert!(!store.is_running(&sandbox()).await);
    let record = store.info(&sandbox()).await.unwrap();
    match record.state {
        JobState::Completed { result, .. } => {
            assert_eq!(result.results["EC2"], 3);
            assert_eq!(result.success_count, 1);
        }
        other => panic!("expected completed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failure_is_recorded_and_restartable() {
    let tmp = TempDir::new().unwrap();
    let store = StatusStore::new(tmp.path());

    store.start(&services(), &sandbox(), 1).await;
    store.finish_failure(&services(), &sandbox(), "EC2 data fetch error: boom").await;
    let record = store.info(&sandbox()).await.unwrap();
    assert_eq!(record.kind(), StatusKind::Failed);
    assert_eq!(record.error(), Some("EC2 data fetch error: boom"));

    store.start(&services(), &sandbox(), 2).await;
    assert_eq!(store.info(&sandbox()).await.unwrap().pid(), Some(2));
}

#[tokio::test]
async fn test_records_are_keyed_by_region_and_profile_only() {
    let tmp = TempDir::new().unwrap();
    let store = StatusStore::new(tmp.path());

    store.start(&["EC2".to_string()], &sandbox(), 10).await;
    // Different services, same scope: same record
    store.start(&["Lambda".to_string()], &sandbox(), 11).await;
    let record = store.info(&sandbox()).await.unwrap();
    assert_eq!(record.services, vec!["Lambda"]);

    let other_region = Scope::new("ap-northeast-1", Some("sandbox".to_string()));
    let other_profile = Scope::new("us-east-1", Some("demo".to_string()));
    assert!(store.info(&other_region).await.is_none());
    assert!(store.info(&other_profile).await.is_none());
}

#[tokio::test]
async fn test_corrupt_record_is_deleted() {
    let tmp = TempDir::new().unwrap();
    let store = StatusStore::new(tmp.path());
    let path = store.record_path(&sandbox());
    tokio::fs::write(&path, "{invalid json}").await.unwrap();

    assert!(!store.is_running(&sandbox()).await);
    assert!(!path.exists(), "corrupt record should be removed");
    assert!(store.info(&sandbox()).await.is_none());
}

#[tokio::test]
async fn test_write_failure_is_swallowed() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("status");
    tokio::fs::write(&blocker, "not a directory").await.unwrap();

    let store = StatusStore::new(&blocker);
    store.start(&services(), &sandbox(), 99).await;
    assert!(!store.is_running(&sandbox()).await);
}

#[tokio::test]
async fn test_clear_all_removes_only_records() {
    let tmp = TempDir::new().unwrap();
    let store = StatusStore::new(tmp.path());
    store.start(&services(), &sandbox(), 1).await;
    store
        .start(&services(), &Scope::new("ap-northeast-1", None), 2)
        .await;
    tokio::fs::write(tmp.path().join("EC2_us-east-1_default.json"), "[]")
        .await
        .unwrap();

    assert_eq!(store.clear_all().await.unwrap(), 2);
    assert!(store.info(&sandbox()).await.is_none());
    assert!(tmp.path().join("EC2_us-east-1_default.json").exists());
    assert_eq!(store.clear_all().await.unwrap(), 0);
}

#[tokio::test]
async fn test_clear_all_on_missing_directory() {
    let tmp = TempDir::new().unwrap();
    let store = StatusStore::new(tmp.path().join("absent"));
    assert_eq!(store.clear_all().await.unwrap(), 0);
}

#[tokio::test]
async fn test_stale_record_is_trusted_without_probe() {
    let tmp = TempDir::new().unwrap();
    let store = StatusStore::new(tmp.path());
    store.start(&services(), &sandbox(), u32::MAX - 1).await;

    assert!(store.is_running(&sandbox()).await);
}

#[tokio::test]
async fn test_liveness_probe_ignores_dead_process() {
    let tmp = TempDir::new().unwrap();
    let store = StatusStore::new(tmp.path()).with_liveness_probe(true);

    store.start(&services(), &sandbox(), u32::MAX - 1).await;
    assert!(!store.is_running(&sandbox()).await);
    // The record itself is untouched
    assert_eq!(
        store.info(&sandbox()).await.unwrap().kind(),
        StatusKind::Running
    );

    store.start(&services(), &sandbox(), std::process::id()).await;
    assert!(store.is_running(&sandbox()).await);
}
