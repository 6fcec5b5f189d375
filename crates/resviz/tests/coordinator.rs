//! Integration tests for refresh decisions and status polling

use resviz::coordinator::{
    BatchInvocation, Coordinator, JobLauncher, MSG_ALREADY_RUNNING, MSG_CACHE_LOAD_FAILED,
    MSG_UNAVAILABLE, Outcome, RefreshRequest,
};
use resviz::view::{AppState, ViewState};
use resviz_cache::{CacheKey, CacheStore};
use resviz_core::{Cell, Dataset, Row, Scope, Settings};
use resviz_state::{RunSummary, StatusKind, StatusStore};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn rows(n: usize) -> Dataset {
    (0..n)
        .map(|i| {
            let mut row = Row::new();
            row.insert("Instance ID".to_string(), Cell::from(format!("i-{i:04}")));
            row
        })
        .collect()
}

/// Launcher that records invocations instead of spawning processes
struct RecordingLauncher {
    available: bool,
    fail: bool,
    launched: Mutex<Vec<BatchInvocation>>,
}

impl RecordingLauncher {
    const fn new() -> Self {
        Self {
            available: true,
            fail: false,
            launched: Mutex::new(Vec::new()),
        }
    }

    fn launched(&self) -> Vec<BatchInvocation> {
        self.launched.lock().unwrap().clone()
    }
}

impl JobLauncher for RecordingLauncher {
    fn is_available(&self) -> bool {
        self.available
    }

    fn launch(&self, invocation: &BatchInvocation) -> io::Result<u32> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        }
        let mut launched = self.launched.lock().unwrap();
        launched.push(invocation.clone());
        Ok(1000 + u32::try_from(launched.len()).unwrap())
    }
}

struct Harness {
    _tmp: TempDir,
    cache: Arc<CacheStore>,
    status: StatusStore,
    launcher: Arc<RecordingLauncher>,
    coordinator: Coordinator,
}

fn harness_with(launcher: RecordingLauncher) -> Harness {
    let tmp = TempDir::new().unwrap();
    let cache = Arc::new(CacheStore::new(tmp.path()));
    let status = StatusStore::new(tmp.path().join("status"));
    let launcher = Arc::new(launcher);
    let coordinator = Coordinator::new(
        Arc::clone(&cache),
        status.clone(),
        Arc::clone(&launcher) as Arc<dyn JobLauncher>,
        Settings::default(),
    );
    Harness {
        _tmp: tmp,
        cache,
        status,
        launcher,
        coordinator,
    }
}

fn harness() -> Harness {
    harness_with(RecordingLauncher::new())
}

fn sandbox() -> Scope {
    Scope::new("us-east-1", Some("sandbox".to_string()))
}

fn ec2() -> Vec<String> {
    vec!["EC2".to_string()]
}

fn request(clear_cache: bool) -> RefreshRequest {
    RefreshRequest {
        services: ec2(),
        region: "us-east-1".to_string(),
        profile: Some("sandbox".to_string()),
        clear_cache,
        force: false,
    }
}

async fn complete(h: &Harness, n: usize) {
    h.cache
        .set(&CacheKey::new("EC2", "us-east-1", Some("sandbox")), &rows(n));
    let mut results = indexmap::IndexMap::new();
    results.insert("EC2".to_string(), n);
    h.status
        .finish_success(
            &ec2(),
            &sandbox(),
            RunSummary::from_counts(ec2(), "us-east-1", results),
        )
        .await;
}

// ==========================================================================
// handle_execution
// ==========================================================================

#[tokio::test]
async fn test_valid_cache_is_reused_without_launch() {
    let h = harness();
    complete(&h, 5).await;
    let mut state = AppState::new();

    let outcome = h.coordinator.handle_execution(&mut state, &request(false)).await;

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(state.dataset("EC2").map(Dataset::len), Some(5));
    assert!(h.launcher.launched().is_empty());
}

#[tokio::test]
async fn test_clear_cache_launches_despite_valid_cache() {
    let h = harness();
    complete(&h, 5).await;
    let mut state = AppState::new();

    let outcome = h.coordinator.handle_execution(&mut state, &request(true)).await;

    assert!(matches!(outcome, Outcome::Started { pid: 1001, previous_error: None }));
    assert!(state.is_loading());
    let launched = h.launcher.launched();
    assert_eq!(launched.len(), 1);
    assert!(launched[0].clear_cache);
    assert_eq!(launched[0].region.as_deref(), Some("us-east-1"));
    assert_eq!(launched[0].profile.as_deref(), Some("sandbox"));
}

#[tokio::test]
async fn test_not_found_launches() {
    let h = harness();
    let mut state = AppState::new();

    let outcome = h.coordinator.handle_execution(&mut state, &request(false)).await;

    assert!(matches!(outcome, Outcome::Started { .. }));
    assert!(state.is_loading());
    assert_eq!(h.launcher.launched()[0].services, ec2());
}

#[tokio::test]
async fn test_running_blocks_unless_forced() {
    let h = harness();
    h.status.start(&ec2(), &sandbox(), 1).await;
    let mut state = AppState::new();

    let outcome = h.coordinator.handle_execution(&mut state, &request(false)).await;
    assert_eq!(outcome, Outcome::AlreadyRunning);
    assert_eq!(state.error(), Some(MSG_ALREADY_RUNNING));
    assert!(h.launcher.launched().is_empty());

    let mut forced = request(false);
    forced.force = true;
    let outcome = h.coordinator.handle_execution(&mut state, &forced).await;
    assert!(matches!(outcome, Outcome::Started { .. }));
    assert!(h.launcher.launched()[0].force);
}

#[tokio::test]
async fn test_failed_run_is_reported_then_retried() {
    let h = harness();
    h.status
        .finish_failure(&ec2(), &sandbox(), "EC2 data fetch error: throttled")
        .await;
    let mut state = AppState::new();

    let outcome = h.coordinator.handle_execution(&mut state, &request(false)).await;

    match outcome {
        Outcome::Started { previous_error, .. } => {
            assert_eq!(previous_error.as_deref(), Some("EC2 data fetch error: throttled"));
        }
        other => panic!("unexpected outcome: {other}"),
    }
    assert!(state.is_loading());
    assert_eq!(h.launcher.launched().len(), 1);
}

#[tokio::test]
async fn test_completed_without_any_cache_is_an_error() {
    let h = harness();
    let mut results = indexmap::IndexMap::new();
    results.insert("EC2".to_string(), 0);
    h.status
        .finish_success(&ec2(), &sandbox(), RunSummary::from_counts(ec2(), "us-east-1", results))
        .await;
    let mut state = AppState::new();

    let outcome = h.coordinator.handle_execution(&mut state, &request(false)).await;

    assert_eq!(outcome, Outcome::Error);
    assert_eq!(state.error(), Some(MSG_CACHE_LOAD_FAILED));
}

#[tokio::test]
async fn test_unavailable_launcher() {
    let h = harness_with(RecordingLauncher {
        available: false,
        ..RecordingLauncher::new()
    });
    let mut state = AppState::new();

    let outcome = h.coordinator.handle_execution(&mut state, &request(false)).await;

    assert_eq!(outcome, Outcome::Error);
    assert_eq!(state.error(), Some(MSG_UNAVAILABLE));
}

#[tokio::test]
async fn test_launch_failure_sets_error_view() {
    let h = harness_with(RecordingLauncher {
        fail: true,
        ..RecordingLauncher::new()
    });
    let mut state = AppState::new();

    let outcome = h.coordinator.handle_execution(&mut state, &request(false)).await;

    assert_eq!(outcome, Outcome::Error);
    assert!(state.error().unwrap().starts_with("Failed to start batch job"));
}

// ==========================================================================
// sync_view
// ==========================================================================

#[tokio::test]
async fn test_sync_view_on_startup() {
    let h = harness();
    let mut state = AppState::new();

    assert_eq!(
        h.coordinator.sync_view(&mut state, &request(false)).await,
        Some(StatusKind::NotFound)
    );
    assert_eq!(state.view(), &ViewState::Idle);

    h.status.start(&ec2(), &sandbox(), 1).await;
    assert_eq!(
        h.coordinator.sync_view(&mut state, &request(false)).await,
        Some(StatusKind::Running)
    );
    assert!(state.is_loading());
}

#[tokio::test]
async fn test_sync_view_follows_job_to_completion() {
    let h = harness();
    // Record of an earlier run
    complete(&h, 2).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let mut state = AppState::new();
    let outcome = h.coordinator.handle_execution(&mut state, &request(true)).await;
    assert!(matches!(outcome, Outcome::Started { .. }));

    // The job has not written its record yet; the old one must not end loading
    h.coordinator.sync_view(&mut state, &request(true)).await;
    assert!(state.is_loading());

    h.status.start(&ec2(), &sandbox(), 1001).await;
    h.coordinator.sync_view(&mut state, &request(true)).await;
    assert!(state.is_loading());

    tokio::time::sleep(Duration::from_millis(10)).await;
    complete(&h, 4).await;
    assert_eq!(
        h.coordinator.sync_view(&mut state, &request(true)).await,
        Some(StatusKind::Completed)
    );
    assert_eq!(state.dataset("EC2").map(Dataset::len), Some(4));

    // Once data is shown, polling leaves it alone
    assert_eq!(h.coordinator.sync_view(&mut state, &request(true)).await, None);
}

#[tokio::test]
async fn test_sync_view_reports_failure() {
    let h = harness();
    let mut state = AppState::new();
    h.coordinator.handle_execution(&mut state, &request(false)).await;
    assert!(state.is_loading());

    tokio::time::sleep(Duration::from_millis(10)).await;
    h.status
        .finish_failure(&ec2(), &sandbox(), "EC2 data fetch error: denied")
        .await;
    h.coordinator.sync_view(&mut state, &request(false)).await;

    assert_eq!(
        state.error(),
        Some("Previous batch run failed: EC2 data fetch error: denied")
    );
}
