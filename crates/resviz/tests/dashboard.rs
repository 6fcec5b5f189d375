//! Dashboard snapshot and rendering over cached data

use resviz::coordinator::{BatchInvocation, Coordinator, JobLauncher, RefreshRequest};
use resviz::dashboard::{Dashboard, DashboardOptions};
use resviz::view::AppState;
use resviz_cache::{CacheKey, CacheStore};
use resviz_core::dataset::{REQUIRED_TAGS_COLUMN, TAGS_COLUMN};
use resviz_core::{Cell, Dataset, Row, Scope, Settings};
use resviz_state::{RunSummary, StatusStore};
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

#[derive(Default)]
struct CountingLauncher {
    launches: AtomicUsize,
}

impl JobLauncher for CountingLauncher {
    fn is_available(&self) -> bool {
        true
    }

    fn launch(&self, _invocation: &BatchInvocation) -> io::Result<u32> {
        Ok(u32::try_from(self.launches.fetch_add(1, Ordering::SeqCst)).unwrap() + 500)
    }
}

fn instance(id: &str, tags: &[(&str, &str)]) -> Row {
    let tags: BTreeMap<String, String> = tags
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let required = tags
        .get("CostProject")
        .map(|v| format!("CostProject:{v}"))
        .unwrap_or_default();
    let mut row = Row::new();
    row.insert("Instance ID".to_string(), Cell::from(id));
    row.insert(REQUIRED_TAGS_COLUMN.to_string(), Cell::from(required));
    row.insert(TAGS_COLUMN.to_string(), Cell::from(tags));
    row
}

struct Harness {
    _tmp: TempDir,
    launcher: Arc<CountingLauncher>,
    coordinator: Coordinator,
}

async fn harness() -> Harness {
    let tmp = TempDir::new().unwrap();
    let cache = Arc::new(CacheStore::new(tmp.path()));
    let status = StatusStore::new(tmp.path().join("status"));
    let scope = Scope::new("us-east-1", Some("sandbox".to_string()));

    let ec2: Dataset = vec![
        instance("i-1", &[("CostProject", "alpha"), ("Env", "prod")]),
        instance("i-2", &[("CostProject", "beta"), ("Env", "dev")]),
        instance("i-3", &[("Env", "prod")]),
    ]
    .into();
    cache.set(&CacheKey::for_scope("EC2", &scope), &ec2);

    let mut results = indexmap::IndexMap::new();
    results.insert("EC2".to_string(), 3);
    results.insert("S3".to_string(), 0);
    let services = vec!["EC2".to_string(), "S3".to_string()];
    status
        .finish_success(
            &services,
            &scope,
            RunSummary::from_counts(services.clone(), "us-east-1", results),
        )
        .await;

    let launcher = Arc::new(CountingLauncher::default());
    let coordinator = Coordinator::new(
        cache,
        status,
        Arc::clone(&launcher) as Arc<dyn JobLauncher>,
        Settings::default(),
    );
    Harness {
        _tmp: tmp,
        launcher,
        coordinator,
    }
}

fn options(tags: &[(&str, &str)], page_size: usize) -> DashboardOptions {
    DashboardOptions {
        request: RefreshRequest {
            services: vec!["EC2".to_string(), "S3".to_string()],
            region: "us-east-1".to_string(),
            profile: Some("sandbox".to_string()),
            clear_cache: false,
            force: false,
        },
        refresh: false,
        tags: tags
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
        page: 1,
        page_size,
        wait: false,
    }
}

#[tokio::test]
async fn test_open_adopts_cache_without_launch() {
    let h = harness().await;
    let dashboard = Dashboard::new(&h.coordinator, options(&[], 20));
    let mut state = AppState::new();

    assert!(dashboard.open(&mut state).await.is_none());
    assert!(state.is_completed());
    assert_eq!(h.launcher.launches.load(Ordering::SeqCst), 0);

    let snapshot = dashboard.snapshot(&state);
    assert_eq!(snapshot.view, "completed");
    assert_eq!(snapshot.services.len(), 2);
    assert_eq!(snapshot.services[0].count, 3);
    assert_eq!(snapshot.services[0].compliance.compliant, 2);
    assert_eq!(snapshot.services[0].compliance.missing, 1);
    assert_eq!(snapshot.services[1].count, 0);
    assert!((snapshot.total_cost - 150.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_tag_filters_narrow_counts_and_rows() {
    let h = harness().await;
    let dashboard = Dashboard::new(&h.coordinator, options(&[("Env", "prod")], 20));
    let mut state = AppState::new();
    dashboard.open(&mut state).await;

    let snapshot = dashboard.snapshot(&state);
    assert_eq!(snapshot.services[0].count, 2);
    assert_eq!(snapshot.rows["EC2"].len(), 2);
    assert!((snapshot.total_cost - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_render_pages_rows() {
    let h = harness().await;
    let dashboard = Dashboard::new(&h.coordinator, options(&[], 2));
    let mut state = AppState::new();
    dashboard.open(&mut state).await;

    let text = dashboard.render(&state);
    assert!(text.contains("Scope: us-east-1/sandbox  Status: completed"));
    assert!(text.contains("== EC2 (page 1/2) =="));
    assert!(text.contains("i-2"));
    assert!(!text.contains("i-3"));
    assert!(text.contains("Total"));
    // Raw tag maps are not shown, only the required tags
    assert!(text.contains("CostProject:alpha"));
    assert!(!text.contains("Env:prod"));
}

#[tokio::test]
async fn test_refresh_launches_even_with_cache() {
    let h = harness().await;
    let mut opts = options(&[], 20);
    opts.refresh = true;
    opts.request.clear_cache = true;
    let dashboard = Dashboard::new(&h.coordinator, opts);
    let mut state = AppState::new();

    let outcome = dashboard.open(&mut state).await;

    assert!(matches!(outcome, Some(resviz::Outcome::Started { pid: 500, .. })));
    assert!(state.is_loading());
    assert!(dashboard.render(&state).contains("Fetching data in the background"));
}
