//! `resviz fetch`: the batch job entry point

use crate::batch::{BatchJob, BatchReport, BatchRequest};
use crate::cli::ScopeArgs;
use crate::commands::CommandContext;
use resviz_aws::AwsInventory;
use std::sync::Arc;

/// Translate command-line arguments into a batch request
#[must_use]
pub fn request_from_args(scope: &ScopeArgs, clear_cache: bool, force: bool) -> BatchRequest {
    BatchRequest {
        services: scope.services.clone(),
        region: scope.region.clone(),
        profile: scope.profile.clone(),
        clear_cache,
        force,
    }
}

/// Run one batch job against AWS
///
/// Failures of the run itself are part of the returned report.
pub async fn execute(ctx: &CommandContext, request: &BatchRequest) -> BatchReport {
    let provider = Arc::new(AwsInventory::from_settings(ctx.settings()));
    let job = BatchJob::new(
        Arc::clone(ctx.cache()),
        ctx.status().clone(),
        provider,
        ctx.settings().clone(),
    );
    job.run(request).await
}
