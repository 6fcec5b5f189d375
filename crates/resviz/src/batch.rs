//! The batch job: one guarded fetch run for a (region, profile)
//!
//! The job is the only writer of `running` records. It talks to the
//! frontend through the status store and the cache alone; its stdout JSON is
//! for whoever launched it by hand.

use indexmap::IndexSet;
use resviz_cache::CacheStore;
use resviz_core::{InventoryProvider, Scope, ServiceKind, Settings};
use resviz_fetch::Fetcher;
use resviz_state::{RunSummary, StatusStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Exit code of a successful run
pub const EXIT_BATCH_OK: i32 = 0;

/// Exit code of a rejected or failed run
pub const EXIT_BATCH_FAILED: i32 = 1;

/// Arguments of one batch invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRequest {
    /// Services to fetch; empty means every supported service
    pub services: Vec<String>,
    /// Explicit region
    pub region: Option<String>,
    /// Credential profile
    pub profile: Option<String>,
    /// Clear the scope's cache entries before fetching
    pub clear_cache: bool,
    /// Run even if a job for the scope is recorded as running
    pub force: bool,
}

/// Failure payload printed on stdout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    /// Always `false`
    pub success: bool,
    /// What went wrong
    pub error: String,
    /// Services requested
    pub services: Vec<String>,
    /// Region of the run
    pub region: String,
}

/// Result of [`BatchJob::run`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BatchReport {
    /// Every service was fetched
    Success(RunSummary),
    /// The run was rejected or a fetch failed
    Failure(BatchFailure),
}

impl BatchReport {
    /// Process exit code for this report
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Success(_) => EXIT_BATCH_OK,
            Self::Failure(_) => EXIT_BATCH_FAILED,
        }
    }

    /// Whether the run succeeded
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Single-line JSON for stdout
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"success":false,"error":"failed to encode result: {e}"}}"#)
        })
    }
}

/// Runs fetches for one scope under the duplicate-run guard
pub struct BatchJob {
    cache: Arc<CacheStore>,
    status: StatusStore,
    provider: Arc<dyn InventoryProvider>,
    settings: Settings,
    pid: u32,
}

impl std::fmt::Debug for BatchJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchJob")
            .field("cache", &self.cache.dir())
            .field("status", &self.status.dir())
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl BatchJob {
    /// Create a job over explicit stores
    #[must_use]
    pub fn new(
        cache: Arc<CacheStore>,
        status: StatusStore,
        provider: Arc<dyn InventoryProvider>,
        settings: Settings,
    ) -> Self {
        Self {
            cache,
            status,
            provider,
            settings,
            pid: std::process::id(),
        }
    }

    /// Process id recorded in the `running` record
    #[must_use]
    pub const fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    /// Scope a request resolves to under the configured run mode
    #[must_use]
    pub fn scope_for(&self, request: &BatchRequest) -> Scope {
        Scope::new(
            self.settings.effective_region(request.region.as_deref()),
            self.settings
                .run_mode
                .effective_profile(request.profile.clone()),
        )
    }

    /// Run the job to completion
    #[instrument(skip(self), fields(force = request.force, clear_cache = request.clear_cache))]
    pub async fn run(&self, request: &BatchRequest) -> BatchReport {
        let services: Vec<String> = if request.services.is_empty() {
            ServiceKind::all_names()
        } else {
            // Repeated --services flags name the same fetch
            request
                .services
                .iter()
                .cloned()
                .collect::<IndexSet<_>>()
                .into_iter()
                .collect()
        };
        let scope = self.scope_for(request);
        info!(services = ?services, scope = %scope, run_mode = %self.settings.run_mode, "Batch run starting");

        let failure = |error: String| {
            BatchReport::Failure(BatchFailure {
                success: false,
                error,
                services: services.clone(),
                region: scope.region.clone(),
            })
        };

        if !request.force && self.status.is_running(&scope).await {
            let message = format!(
                "A batch job is already running for {scope}. Use --force to run anyway."
            );
            error!(scope = %scope, "{message}");
            return failure(message);
        }

        self.status.start(&services, &scope, self.pid).await;

        let fetcher = Fetcher::from_settings(
            Arc::clone(&self.cache),
            Arc::clone(&self.provider),
            scope.clone(),
            &self.settings,
        );
        if request.clear_cache {
            fetcher.clear_cache().await;
        }

        match fetcher.fetch_all(&services).await {
            Ok(data) => {
                let results = data
                    .iter()
                    .map(|(service, dataset)| (service.clone(), dataset.len()))
                    .collect();
                let summary = RunSummary::from_counts(services.clone(), &scope.region, results);
                self.status
                    .finish_success(&services, &scope, summary.clone())
                    .await;
                info!(
                    scope = %scope,
                    success_count = summary.success_count,
                    total_count = summary.total_count,
                    "Batch run finished"
                );
                BatchReport::Success(summary)
            }
            Err(e) => {
                let message = e.to_string();
                self.status.finish_failure(&services, &scope, &message).await;
                error!(scope = %scope, error = %message, "Batch run failed");
                failure(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn test_failure_json_shape() {
        let report = BatchReport::Failure(BatchFailure {
            success: false,
            error: "boom".to_string(),
            services: vec!["EC2".to_string()],
            region: "us-east-1".to_string(),
        });
        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
        assert_eq!(json["region"], "us-east-1");
        assert_eq!(report.exit_code(), EXIT_BATCH_FAILED);
    }

    #[test]
    fn test_success_json_shape() {
        let mut results = IndexMap::new();
        results.insert("EC2".to_string(), 3);
        let report = BatchReport::Success(RunSummary::from_counts(
            vec!["EC2".to_string()],
            "us-east-1",
            results,
        ));
        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["success_count"], 1);
        assert_eq!(json["total_count"], 1);
        assert_eq!(json["results"]["EC2"], 3);
        assert!(report.is_success());
        assert_eq!(report.exit_code(), EXIT_BATCH_OK);
    }
}
