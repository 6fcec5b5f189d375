//! Text dashboard: inventory, tag compliance and cost estimates
//!
//! The dashboard is one frontend over the [`Coordinator`]. It adopts cached
//! data when the last run completed, otherwise starts a batch job and polls
//! the status record every `poll_interval_secs` until the job ends.

use crate::cli::CliError;
use crate::commands::{CommandContext, to_json};
use crate::coordinator::{Coordinator, Outcome, RefreshRequest, auth_failure_message};
use crate::view::{AppState, ViewState};
use chrono::{DateTime, Utc};
use resviz_core::dataset::TAGS_COLUMN;
use resviz_core::inventory::{
    CostEstimate, TagCompliance, TagFilters, estimate_costs, filter_by_tags, filtered_counts,
    total_cost,
};
use resviz_core::{Dataset, Scope, ServiceData};
use serde::Serialize;
use std::fmt::Write;
use tracing::{debug, info, warn};

/// What to show and whether to start a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardOptions {
    /// Services, scope and cache behavior
    pub request: RefreshRequest,
    /// Start a fetch even when the last run completed
    pub refresh: bool,
    /// Only rows carrying all of these tags
    pub tags: TagFilters,
    /// 1-based page of rows per service
    pub page: usize,
    /// Rows per page
    pub page_size: usize,
    /// Poll until a running job finishes
    pub wait: bool,
}

/// Per-service line of the summary table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSummary {
    /// Service name
    pub service: String,
    /// Rows after tag filtering
    pub count: usize,
    /// Required-tag coverage of the filtered rows
    pub compliance: TagCompliance,
    /// Rough monthly cost of the filtered rows
    pub cost: CostEstimate,
}

/// Everything the dashboard shows, for JSON output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Scope shown
    pub scope: Scope,
    /// View state name
    pub view: &'static str,
    /// Error message, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Start of the loading phase, if loading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loading_since: Option<DateTime<Utc>>,
    /// Per-service summary
    pub services: Vec<ServiceSummary>,
    /// Overall required-tag coverage
    pub compliance: TagCompliance,
    /// Sum of the monthly cost estimates
    pub total_cost: f64,
    /// Current page of filtered rows per service
    pub rows: ServiceData,
}

/// The dashboard frontend
pub struct Dashboard<'a> {
    coordinator: &'a Coordinator,
    options: DashboardOptions,
}

impl<'a> Dashboard<'a> {
    /// Create a dashboard over a coordinator
    #[must_use]
    pub const fn new(coordinator: &'a Coordinator, options: DashboardOptions) -> Self {
        Self {
            coordinator,
            options,
        }
    }

    /// Bring the view up to date on start-up
    ///
    /// Without `refresh`, the existing status decides: cached data is
    /// adopted and a running job is followed. A fetch is started only when
    /// nothing is known yet for the scope.
    pub async fn open(&self, state: &mut AppState) -> Option<Outcome> {
        let request = &self.options.request;
        if !self.options.refresh {
            let observed = self.coordinator.sync_view(state, request).await;
            debug!(status = ?observed, view = state.view().name(), "Initial status");
            if !matches!(state.view(), ViewState::Idle) {
                return None;
            }
        }
        let outcome = self.coordinator.handle_execution(state, request).await;
        info!(outcome = %outcome, "Refresh requested");
        Some(outcome)
    }

    /// Poll the status record until the job leaves the running state
    pub async fn follow(&self, state: &mut AppState) {
        let interval = self.coordinator.settings().poll_interval();
        while state.is_loading() {
            tokio::time::sleep(interval).await;
            let observed = self.coordinator.sync_view(state, &self.options.request).await;
            debug!(status = ?observed, view = state.view().name(), "Polled status");
        }
    }

    /// Collect what is shown for the current view
    #[must_use]
    pub fn snapshot(&self, state: &AppState) -> Snapshot {
        let settings = self.coordinator.settings();
        let filters = &self.options.tags;
        let empty = ServiceData::new();
        let data = state.data().unwrap_or(&empty);

        let counts = filtered_counts(data, filters);
        let services: Vec<ServiceSummary> = estimate_costs(&counts, settings)
            .into_iter()
            .map(|cost| {
                let filtered = data
                    .get(&cost.service)
                    .map(|dataset| filter_by_tags(dataset, filters))
                    .unwrap_or_default();
                ServiceSummary {
                    service: cost.service.clone(),
                    count: cost.count,
                    compliance: TagCompliance::of(&filtered, &settings.required_tags),
                    cost,
                }
            })
            .collect();

        let rows = data
            .iter()
            .map(|(service, dataset)| {
                let filtered = filter_by_tags(dataset, filters);
                let (start, end) = page_bounds(filtered.len(), self.options.page, self.options.page_size);
                let page: Dataset = filtered.rows()[start..end].iter().cloned().collect();
                (service.clone(), page)
            })
            .collect();

        let estimates: Vec<CostEstimate> = services.iter().map(|s| s.cost.clone()).collect();
        Snapshot {
            scope: self.coordinator.scope_for(&self.options.request),
            view: state.view().name(),
            error: state.error().map(str::to_string),
            loading_since: state.loading_since(),
            compliance: services
                .iter()
                .fold(TagCompliance::default(), |acc, s| acc.merge(s.compliance)),
            total_cost: total_cost(&estimates),
            services,
            rows,
        }
    }

    /// Render the current view as text
    #[must_use]
    pub fn render(&self, state: &AppState) -> String {
        let snapshot = self.snapshot(state);
        let mut out = format!("Scope: {}  Status: {}", snapshot.scope, snapshot.view);

        let cache = self.coordinator.cache().summary(
            &self.options.request.services,
            &snapshot.scope,
            self.coordinator.settings().cache_ttl(),
        );
        let _ = write!(
            out,
            "\nCache: {}/{} services valid",
            cache.valid_count, cache.total_count
        );
        if let Some(fetched) = cache.latest_fetch_time {
            let _ = write!(out, ", last fetch {}", fetched.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        if !self.options.tags.is_empty() {
            let filters: Vec<String> = self
                .options
                .tags
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            let _ = write!(out, "\nFilter: {}", filters.join(", "));
        }

        match state.view() {
            ViewState::Idle => out.push_str("\n\nNo data loaded."),
            ViewState::Loading => {
                let since = snapshot
                    .loading_since
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_default();
                let _ = write!(out, "\n\nFetching data in the background (since {since})...");
            }
            ViewState::Error(message) => {
                let _ = write!(out, "\n\nError: {message}");
            }
            ViewState::Completed(_) => {
                out.push_str("\n\n");
                out.push_str(&summary_table(&snapshot));
                for (service, page) in &snapshot.rows {
                    if page.is_empty() {
                        continue;
                    }
                    let total = snapshot
                        .services
                        .iter()
                        .find(|s| &s.service == service)
                        .map_or(page.len(), |s| s.count);
                    let pages = page_count(total, self.options.page_size);
                    let current = self.options.page.clamp(1, pages);
                    let _ = write!(out, "\n\n== {service} (page {current}/{pages}) ==\n");
                    out.push_str(&rows_table(page));
                }
            }
        }
        out
    }
}

/// Check credentials, open the dashboard and render it
///
/// # Errors
///
/// Returns an error if credentials are missing or the coordinator cannot be
/// built.
pub async fn execute(ctx: &CommandContext, options: DashboardOptions, json: bool) -> Result<String, CliError> {
    let coordinator = ctx.coordinator()?;
    let scope = coordinator.scope_for(&options.request);
    if let Err(e) = resviz_aws::validate_credentials(scope.profile.as_deref()).await {
        warn!(error = %e, "Credential check failed");
        return Err(CliError::config(auth_failure_message(scope.profile.as_deref())));
    }

    let wait = options.wait;
    let dashboard = Dashboard::new(&coordinator, options);
    let mut state = AppState::new();
    dashboard.open(&mut state).await;
    if wait {
        dashboard.follow(&mut state).await;
    }

    if json {
        to_json(&dashboard.snapshot(&state))
    } else {
        Ok(dashboard.render(&state))
    }
}

fn page_count(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1)).max(1)
}

/// Row range of a 1-based page, clamped to the dataset
fn page_bounds(len: usize, page: usize, page_size: usize) -> (usize, usize) {
    let page_size = page_size.max(1);
    let page = page.clamp(1, page_count(len, page_size));
    let start = ((page - 1) * page_size).min(len);
    (start, (start + page_size).min(len))
}

fn summary_table(snapshot: &Snapshot) -> String {
    let headers = ["Service", "Resources", "Tagged", "Missing", "Compliance", "Est. $/month"]
        .map(str::to_string);
    let mut rows: Vec<Vec<String>> = snapshot
        .services
        .iter()
        .map(|s| {
            vec![
                s.service.clone(),
                s.count.to_string(),
                s.compliance.compliant.to_string(),
                s.compliance.missing.to_string(),
                format!("{:.1}%", s.compliance.rate()),
                format!("{:.2}", s.cost.monthly_cost),
            ]
        })
        .collect();
    rows.push(vec![
        "Total".to_string(),
        snapshot.compliance.total().to_string(),
        snapshot.compliance.compliant.to_string(),
        snapshot.compliance.missing.to_string(),
        format!("{:.1}%", snapshot.compliance.rate()),
        format!("{:.2}", snapshot.total_cost),
    ]);
    format_table(&headers, &rows)
}

fn rows_table(dataset: &Dataset) -> String {
    let headers: Vec<String> = dataset
        .columns()
        .into_iter()
        .filter(|c| *c != TAGS_COLUMN)
        .map(str::to_string)
        .collect();
    let rows: Vec<Vec<String>> = dataset
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(h).map(ToString::to_string).unwrap_or_default())
                .collect()
        })
        .collect();
    format_table(&headers, &rows)
}

fn format_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(headers);
    out.push('\n');
    out.push_str(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
    for row in rows {
        out.push('\n');
        out.push_str(&line(row));
    }
    out
}
