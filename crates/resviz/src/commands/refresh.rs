//! `resviz refresh`: reuse the cache or start a background fetch

use crate::cli::CliError;
use crate::commands::{CommandContext, to_json};
use crate::coordinator::{Coordinator, Outcome, RefreshRequest, auth_failure_message};
use crate::view::AppState;
use resviz_core::Scope;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
struct RefreshOutput {
    outcome: String,
    view: &'static str,
    scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resources: Option<usize>,
}

/// Check credentials, then act on the request
///
/// # Errors
///
/// Returns an error if credentials are missing, a job is already running,
/// or nothing could be loaded or started.
pub async fn execute(ctx: &CommandContext, request: &RefreshRequest, json: bool) -> Result<String, CliError> {
    let coordinator = ctx.coordinator()?;
    let scope = coordinator.scope_for(request);
    if let Err(e) = resviz_aws::validate_credentials(scope.profile.as_deref()).await {
        warn!(error = %e, "Credential check failed");
        return Err(CliError::config(auth_failure_message(scope.profile.as_deref())));
    }
    refresh(&coordinator, request, json).await
}

/// Act on the request with an already-built coordinator
///
/// # Errors
///
/// Returns an error if a job is already running, or nothing could be
/// loaded or started.
pub async fn refresh(coordinator: &Coordinator, request: &RefreshRequest, json: bool) -> Result<String, CliError> {
    let mut state = AppState::new();
    let outcome = coordinator.handle_execution(&mut state, request).await;

    let (pid, previous_error) = match &outcome {
        Outcome::Started {
            pid,
            previous_error,
        } => (Some(*pid), previous_error.clone()),
        Outcome::Completed => (None, None),
        Outcome::AlreadyRunning | Outcome::Error => {
            let message = state.error().unwrap_or("Refresh failed").to_string();
            return Err(CliError::other(message));
        }
    };

    let output = RefreshOutput {
        outcome: outcome.to_string(),
        view: state.view().name(),
        scope: coordinator.scope_for(request),
        pid,
        previous_error,
        resources: state.data().map(|data| data.values().map(resviz_core::Dataset::len).sum()),
    };

    if json {
        return to_json(&output);
    }

    let mut text = match (&output.pid, &output.resources) {
        (Some(pid), _) => format!("Started batch job {pid} for {}", output.scope),
        (None, Some(count)) => format!("Loaded {count} cached resources for {}", output.scope),
        (None, None) => format!("Nothing to show for {}", output.scope),
    };
    if let Some(error) = &output.previous_error {
        text = format!("{text}\nPrevious run failed: {error}");
    }
    Ok(text)
}
