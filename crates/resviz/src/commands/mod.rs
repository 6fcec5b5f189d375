//! Command implementations
//!
//! Each command returns the text to print; `main` decides where it goes and
//! which exit code follows.

pub mod cache;
pub mod fetch;
pub mod refresh;
pub mod status;

use crate::cli::{CliError, OkEnvelope, ScopeArgs};
use crate::coordinator::{Coordinator, ProcessLauncher, RefreshRequest};
use resviz_cache::CacheStore;
use resviz_core::{Scope, Settings};
use resviz_state::StatusStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Settings and stores shared by the commands of one invocation
#[derive(Debug, Clone)]
pub struct CommandContext {
    settings: Settings,
    config_path: Option<PathBuf>,
    cache: Arc<CacheStore>,
    status: StatusStore,
}

impl CommandContext {
    /// Load settings (optionally from `config`) and open the stores
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or no cache directory
    /// can be determined.
    pub fn load(config: Option<&Path>) -> Result<Self, CliError> {
        let settings = Settings::load(config)?;
        Self::from_settings(settings, config.map(Path::to_path_buf))
    }

    /// Open the stores named by already-resolved settings
    ///
    /// # Errors
    ///
    /// Returns an error if no cache directory can be determined.
    pub fn from_settings(settings: Settings, config_path: Option<PathBuf>) -> Result<Self, CliError> {
        let cache = Arc::new(CacheStore::new(settings.cache_dir()?));
        let status =
            StatusStore::new(settings.status_dir()?).with_liveness_probe(settings.liveness_probe);
        Ok(Self {
            settings,
            config_path,
            cache,
            status,
        })
    }

    /// Settings in effect
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Shared cache store
    #[must_use]
    pub const fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Status store
    #[must_use]
    pub const fn status(&self) -> &StatusStore {
        &self.status
    }

    /// Scope named by command-line arguments
    #[must_use]
    pub fn scope(&self, region: Option<&str>, profile: Option<String>) -> Scope {
        Scope::new(
            self.settings.effective_region(region),
            self.settings.run_mode.effective_profile(profile),
        )
    }

    /// Refresh request for the frontend
    #[must_use]
    pub fn refresh_request(&self, args: &ScopeArgs, clear_cache: bool, force: bool) -> RefreshRequest {
        RefreshRequest {
            services: args.services_or_all(),
            region: self.settings.effective_region(args.region.as_deref()),
            profile: args.profile.clone(),
            clear_cache,
            force,
        }
    }

    /// Coordinator that launches this binary for batch jobs
    ///
    /// # Errors
    ///
    /// Returns an error if the log directory or the current executable
    /// cannot be determined.
    pub fn coordinator(&self) -> Result<Coordinator, CliError> {
        let launcher = ProcessLauncher::from_env(self.settings.log_dir()?)
            .map_err(|e| CliError::other(format!("Cannot locate the resviz executable: {e}")))?
            .with_config(self.config_path.clone());
        Ok(Coordinator::new(
            Arc::clone(&self.cache),
            self.status.clone(),
            Arc::new(launcher),
            self.settings.clone(),
        ))
    }
}

/// Serialize `value` inside an [`OkEnvelope`] for `--json` output
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(&OkEnvelope::new(value))
        .map_err(|e| CliError::other(format!("JSON serialization failed: {e}")))
}
