//! Deciding whether a refresh reuses the cache, waits, or starts a job
//!
//! The coordinator never blocks on a batch job. It reads the status record
//! for the scope, then either adopts cached data, reports an in-flight run,
//! or launches a detached job and switches the view to loading. The
//! frontend keeps calling [`Coordinator::sync_view`] until the job's record
//! turns terminal.

mod launcher;

pub use launcher::{BatchInvocation, EXECUTABLE_VAR, JobLauncher, ProcessLauncher};

use crate::view::AppState;
use resviz_cache::{CacheKey, CacheStore};
use resviz_core::{Scope, ServiceData, Settings};
use resviz_state::{StatusKind, StatusRecord, StatusStore};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Shown when no batch executable can be found
pub const MSG_UNAVAILABLE: &str = "Batch executable not found";

/// Shown when a job for the same region and profile is in flight
pub const MSG_ALREADY_RUNNING: &str =
    "A batch job with the same region and profile is running. Wait for it to finish.";

/// Shown when a completed run left nothing in the cache
pub const MSG_CACHE_LOAD_FAILED: &str = "Failed to load cached data";

/// Message for a previous run that failed
#[must_use]
pub fn previous_failure_message(error: &str) -> String {
    format!("Previous batch run failed: {error}")
}

/// Message for a job that could not be started
#[must_use]
pub fn launch_failure_message(error: &str) -> String {
    format!("Failed to start batch job: {error}")
}

/// Message for missing credentials, with a remediation hint
#[must_use]
pub fn auth_failure_message(profile: Option<&str>) -> String {
    match profile {
        Some(profile) => format!(
            "AWS credentials not found for profile '{profile}'. \
             Run `aws configure --profile {profile}` or `aws sso login --profile {profile}`."
        ),
        None => "AWS credentials not found. Run `aws configure` or attach a role to the task."
            .to_string(),
    }
}

/// A refresh asked for by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    /// Services to show
    pub services: Vec<String>,
    /// Selected region
    pub region: String,
    /// Selected profile
    pub profile: Option<String>,
    /// Fetch fresh data even when the cache is valid
    pub clear_cache: bool,
    /// Start a job even if one is recorded as running
    pub force: bool,
}

/// What [`Coordinator::handle_execution`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Cached data was adopted; no job started
    Completed,
    /// A batch job was launched
    Started {
        /// Process id of the job
        pid: u32,
        /// Error of the previous run, when it had failed
        previous_error: Option<String>,
    },
    /// A job for the scope is already running
    AlreadyRunning,
    /// Nothing could be shown or started; the view holds the message
    Error,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Started { .. } => "started",
            Self::AlreadyRunning => "already_running",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Frontend-side façade over the status store, the cache and the launcher
pub struct Coordinator {
    cache: Arc<CacheStore>,
    status: StatusStore,
    launcher: Arc<dyn JobLauncher>,
    settings: Settings,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("cache", &self.cache.dir())
            .field("status", &self.status.dir())
            .field("run_mode", &self.settings.run_mode)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Create a coordinator over explicit stores and launcher
    #[must_use]
    pub fn new(
        cache: Arc<CacheStore>,
        status: StatusStore,
        launcher: Arc<dyn JobLauncher>,
        settings: Settings,
    ) -> Self {
        Self {
            cache,
            status,
            launcher,
            settings,
        }
    }

    /// The cache store this coordinator reads
    #[must_use]
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// The status store this coordinator reads
    #[must_use]
    pub const fn status(&self) -> &StatusStore {
        &self.status
    }

    /// Settings in effect
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Scope a request maps to; managed runs use the ambient region
    #[must_use]
    pub fn scope_for(&self, request: &RefreshRequest) -> Scope {
        Scope::new(
            self.settings.effective_region(Some(&request.region)),
            self.settings
                .run_mode
                .effective_profile(request.profile.clone()),
        )
    }

    /// Act on a refresh request
    ///
    /// | status | clear cache | action |
    /// |---|---|---|
    /// | running | - | error, or launch when forced |
    /// | completed | no | adopt cached data |
    /// | completed | yes | launch |
    /// | failed | - | show the old error, then launch |
    /// | not found | - | launch |
    #[instrument(skip(self, state), fields(region = %request.region, clear_cache = request.clear_cache))]
    pub async fn handle_execution(&self, state: &mut AppState, request: &RefreshRequest) -> Outcome {
        if !self.launcher.is_available() {
            warn!("Batch executable not available");
            state.set_error(MSG_UNAVAILABLE);
            return Outcome::Error;
        }

        let scope = self.scope_for(request);
        if self.status.is_running(&scope).await {
            if !request.force {
                info!(scope = %scope, "Batch already running");
                state.set_error(MSG_ALREADY_RUNNING);
                return Outcome::AlreadyRunning;
            }
            warn!(scope = %scope, "Forcing a new batch over a running one");
            return self.spawn(state, request, None);
        }

        let record = self.status.info(&scope).await;
        match record.as_ref().map(StatusRecord::kind) {
            Some(StatusKind::Completed) if !request.clear_cache => {
                if self.load_from_cache(state, &request.services, &scope).await {
                    Outcome::Completed
                } else {
                    state.set_error(MSG_CACHE_LOAD_FAILED);
                    Outcome::Error
                }
            }
            Some(StatusKind::Failed) => {
                let error = record
                    .as_ref()
                    .and_then(StatusRecord::error)
                    .unwrap_or("unknown error")
                    .to_string();
                state.set_error(previous_failure_message(&error));
                self.spawn(state, request, Some(error))
            }
            // Completed with a cache clear, not found, or a running record
            // the liveness probe found stale
            _ => self.spawn(state, request, None),
        }
    }

    /// Bring the view in line with the status record
    ///
    /// Called on start-up and on every poll. A view that already holds
    /// data is left alone. While loading, terminal records written before
    /// the loading phase began belong to an earlier run and are ignored.
    /// Returns the status that was observed, or `None` when skipped.
    pub async fn sync_view(&self, state: &mut AppState, request: &RefreshRequest) -> Option<StatusKind> {
        if state.has_data() {
            return None;
        }

        let scope = self.scope_for(request);
        if self.status.is_running(&scope).await {
            state.set_loading();
            return Some(StatusKind::Running);
        }

        let record = self.status.info(&scope).await;
        let kind = StatusKind::of(record.as_ref());
        if let (Some(since), Some(ended)) = (
            state.loading_since(),
            record.as_ref().and_then(StatusRecord::end_time),
        ) && ended < since
        {
            debug!(scope = %scope, "Ignoring record of an earlier run");
            return Some(kind);
        }

        match kind {
            StatusKind::Completed => {
                if !self.load_from_cache(state, &request.services, &scope).await && state.is_loading() {
                    // The run succeeded but found nothing to cache
                    state.set_completed(empty_data(&request.services));
                }
            }
            StatusKind::Failed => {
                let error = record
                    .as_ref()
                    .and_then(StatusRecord::error)
                    .unwrap_or("unknown error");
                state.set_error(previous_failure_message(error));
            }
            StatusKind::Running | StatusKind::NotFound => {}
        }
        Some(kind)
    }

    fn spawn(&self, state: &mut AppState, request: &RefreshRequest, previous_error: Option<String>) -> Outcome {
        if request.clear_cache {
            state.reset();
        }

        let invocation = BatchInvocation::new(request, self.settings.run_mode);
        match self.launcher.launch(&invocation) {
            Ok(pid) => {
                info!(pid, services = ?request.services, "Batch job started");
                state.set_loading();
                Outcome::Started { pid, previous_error }
            }
            Err(e) => {
                warn!(error = %e, "Failed to launch batch job");
                state.set_error(launch_failure_message(&e.to_string()));
                Outcome::Error
            }
        }
    }

    /// Read every requested service from the cache into the view
    ///
    /// Services without a live entry get an empty dataset. The data is
    /// adopted only when the cache holds at least one entry of any scope.
    async fn load_from_cache(&self, state: &mut AppState, services: &[String], scope: &Scope) -> bool {
        let ttl = self.settings.cache_ttl();
        let mut data = ServiceData::with_capacity(services.len());
        for service in services {
            let key = CacheKey::for_scope(service, scope);
            let dataset = self.cache.load(&key, ttl).await.unwrap_or_default();
            data.insert(service.clone(), dataset);
        }

        if self.cache.has_any() {
            debug!(scope = %scope, services = data.len(), "Adopted cached data");
            state.set_completed(data);
            true
        } else {
            false
        }
    }
}

fn empty_data(services: &[String]) -> ServiceData {
    services
        .iter()
        .map(|service| (service.clone(), resviz_core::Dataset::new()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_message_names_profile() {
        let message = auth_failure_message(Some("sandbox"));
        assert!(message.contains("'sandbox'"));
        assert!(message.contains("aws sso login --profile sandbox"));
        assert!(!auth_failure_message(None).contains("--profile"));
    }

    #[test]
    fn test_outcome_names() {
        assert_eq!(Outcome::Completed.to_string(), "completed");
        assert_eq!(
            Outcome::Started {
                pid: 1,
                previous_error: None
            }
            .to_string(),
            "started"
        );
        assert_eq!(Outcome::AlreadyRunning.to_string(), "already_running");
    }

    #[test]
    fn test_failure_templates() {
        assert_eq!(
            previous_failure_message("EC2 data fetch error: boom"),
            "Previous batch run failed: EC2 data fetch error: boom"
        );
        assert!(launch_failure_message("No such file").starts_with("Failed to start batch job"));
    }
}
