//! `resviz status`: inspect or clear execution status records

use crate::cli::CliError;
use crate::commands::{CommandContext, to_json};
use resviz_core::Scope;
use resviz_state::liveness::process_alive;
use resviz_state::{JobState, StatusKind, StatusRecord};
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Serialize)]
struct StatusOutput {
    scope: Scope,
    status: StatusKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    process_alive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<StatusRecord>,
}

/// Show the record for a scope
///
/// # Errors
///
/// Returns an error only if JSON encoding fails.
pub async fn show(ctx: &CommandContext, scope: &Scope, json: bool) -> Result<String, CliError> {
    let record = ctx.status().info(scope).await;
    let output = StatusOutput {
        scope: scope.clone(),
        status: StatusKind::of(record.as_ref()),
        process_alive: record.as_ref().and_then(StatusRecord::pid).map(process_alive),
        record,
    };

    if json {
        return to_json(&output);
    }
    Ok(render(&output))
}

/// Remove every status record
///
/// # Errors
///
/// Returns an error if the status directory cannot be read or a record
/// cannot be removed.
pub async fn clear(ctx: &CommandContext, json: bool) -> Result<String, CliError> {
    let removed = ctx.status().clear_all().await?;
    if json {
        return to_json(&serde_json::json!({ "removed": removed }));
    }
    Ok(format!("Removed {removed} status record(s)"))
}

fn render(output: &StatusOutput) -> String {
    let mut text = format!("Scope:  {}\nStatus: {}", output.scope, output.status);
    let Some(record) = &output.record else {
        return text;
    };

    let _ = write!(text, "\nServices: {}", record.services.join(", "));
    match &record.state {
        JobState::Running {
            start_time,
            pid,
            host,
        } => {
            let alive = match output.process_alive {
                Some(true) => "alive",
                Some(false) => "not found on this host",
                None => "unknown",
            };
            let _ = write!(text, "\nStarted: {}", start_time.to_rfc3339());
            let _ = write!(text, "\nPid:     {pid} ({alive})");
            if let Some(host) = host {
                let _ = write!(text, "\nHost:    {host}");
            }
        }
        JobState::Completed { end_time, result } => {
            let _ = write!(text, "\nFinished: {}", end_time.to_rfc3339());
            for (service, count) in &result.results {
                let _ = write!(text, "\n  {service}: {count}");
            }
        }
        JobState::Failed { end_time, error } => {
            let _ = write!(text, "\nFailed:  {}", end_time.to_rfc3339());
            let _ = write!(text, "\nError:   {error}");
        }
    }
    text
}
