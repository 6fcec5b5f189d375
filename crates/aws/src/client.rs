//! SDK configuration per scope, credential checks and error normalization

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use resviz_core::{ProviderError, Scope};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Loads and memoizes one [`SdkConfig`] per scope
#[derive(Debug, Default)]
pub struct ConfigCache {
    configs: Mutex<HashMap<Scope, SdkConfig>>,
}

impl ConfigCache {
    /// Config for a scope, loading it on first use
    pub async fn get(&self, scope: &Scope) -> SdkConfig {
        let mut configs = self.configs.lock().await;
        if let Some(config) = configs.get(scope) {
            return config.clone();
        }
        let config = load_config(Some(&scope.region), scope.profile.as_deref()).await;
        configs.insert(scope.clone(), config.clone());
        config
    }
}

/// Load SDK configuration for an optional region and profile
pub async fn load_config(region: Option<&str>, profile: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }
    debug!(region, profile, "Loading AWS configuration");
    loader.load().await
}

/// Check that credentials resolve for a profile
///
/// `None` and `"default"` both use the default credential chain.
///
/// # Errors
///
/// Returns [`ProviderError::MissingCredentials`] when no provider is
/// configured or it fails to produce credentials.
pub async fn validate_credentials(profile: Option<&str>) -> Result<(), ProviderError> {
    let profile = profile.filter(|p| *p != resviz_core::DEFAULT_PROFILE);
    let config = load_config(None, profile).await;
    let missing = || ProviderError::MissingCredentials {
        service: "AWS".to_string(),
    };

    let provider = config.credentials_provider().ok_or_else(missing)?;
    provider.provide_credentials().await.map_err(|e| {
        debug!(profile, error = %e, "Credential resolution failed");
        missing()
    })?;
    Ok(())
}

/// Normalize an SDK error into a [`ProviderError`] for `service`
pub fn map_sdk_error<E, R>(service: &str, err: &SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if let Some(code) = err.code() {
        let message = err
            .message()
            .map_or_else(|| DisplayErrorContext(err).to_string(), str::to_string);
        return ProviderError::api(service, code, message);
    }

    let context = DisplayErrorContext(err).to_string();
    if is_credentials_failure(&context) {
        return ProviderError::MissingCredentials {
            service: service.to_string(),
        };
    }
    ProviderError::unexpected(service, context)
}

fn is_credentials_failure(context: &str) -> bool {
    let lower = context.to_lowercase();
    lower.contains("no credentials")
        || lower.contains("credentials provider")
        || lower.contains("failed to load credentials")
}
