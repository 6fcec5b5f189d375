//! `resviz cache`: inspect or clear the inventory cache

use crate::cli::{CliError, ScopeArgs};
use crate::commands::{CommandContext, to_json};
use resviz_cache::{CacheKey, CacheSummary, ClearScope};
use resviz_core::Scope;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Serialize)]
struct InfoOutput {
    scope: Scope,
    ttl_secs: u64,
    #[serde(flatten)]
    summary: CacheSummary,
}

/// Validity of the cached services of a scope
///
/// # Errors
///
/// Returns an error only if JSON encoding fails.
pub fn info(ctx: &CommandContext, args: &ScopeArgs, json: bool) -> Result<String, CliError> {
    let scope = ctx.scope(args.region.as_deref(), args.profile.clone());
    let services = args.services_or_all();
    let ttl = ctx.settings().cache_ttl();
    let summary = ctx.cache().summary(&services, &scope, ttl);

    let output = InfoOutput {
        scope,
        ttl_secs: ttl.as_secs(),
        summary,
    };
    if json {
        return to_json(&output);
    }

    let mut text = format!(
        "Scope: {}\nValid: {}/{} services",
        output.scope, output.summary.valid_count, output.summary.total_count
    );
    if let Some(fetched) = output.summary.latest_fetch_time {
        let _ = write!(text, "\nLast fetch:    {}", fetched.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(expires) = output.summary.earliest_expire_time {
        let _ = write!(text, "\nFirst expiry:  {}", expires.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(text)
}

/// Number of entry files and their combined size
///
/// # Errors
///
/// Returns an error if the cache directory cannot be listed.
pub fn size(ctx: &CommandContext, json: bool) -> Result<String, CliError> {
    let size = ctx.cache().size()?;
    if json {
        return to_json(&size);
    }
    Ok(format!(
        "{} file(s), {:.2} MB in {}",
        size.file_count,
        size.total_megabytes(),
        ctx.cache().dir().display()
    ))
}

/// Remove one entry, or every entry when no service is given
///
/// # Errors
///
/// Returns an error if a file cannot be removed, or a service is given
/// without a region.
pub fn clear(
    ctx: &CommandContext,
    service: Option<&str>,
    region: Option<&str>,
    profile: Option<&str>,
    json: bool,
) -> Result<String, CliError> {
    let target = match (service, region) {
        (Some(service), Some(region)) => ClearScope::Entry(CacheKey::new(service, region, profile)),
        (None, None) => ClearScope::All,
        _ => {
            return Err(CliError::config_with_help(
                "Both --service and --region are required to clear one entry",
                "Omit both to clear the whole cache",
            ));
        }
    };

    let removed = ctx.cache().clear(&target)?;
    if json {
        return to_json(&serde_json::json!({ "removed": removed }));
    }
    Ok(match target {
        ClearScope::Entry(key) if removed == 0 => format!("No cache entry for {key}"),
        ClearScope::Entry(key) => format!("Removed cache entry {key}"),
        ClearScope::All => format!("Removed {removed} cache entry file(s)"),
    })
}
