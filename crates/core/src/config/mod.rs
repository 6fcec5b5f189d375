//! Settings for resviz
//!
//! Resolution order: built-in defaults, then an optional TOML file, then
//! `RESVIZ_*` environment variables.

use crate::{Error, Result, ServiceKind, paths};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Region used when neither an argument nor the environment names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Environment variable that carries the ambient region in managed mode
pub const AMBIENT_REGION_VAR: &str = "AWS_DEFAULT_REGION";

/// How the batch job is being run
///
/// Local and container runs pass region and profile explicitly. Managed
/// (orchestrated) runs rely on ambient identity: no profile, and the region
/// comes from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Run directly on the host
    #[default]
    Local,
    /// Run inside a container with mounted credentials
    Docker,
    /// Run as a managed task with an attached role
    Ecs,
}

impl RunMode {
    /// Whether credentials and region come from the ambient environment
    #[must_use]
    pub const fn is_managed(self) -> bool {
        matches!(self, Self::Ecs)
    }

    /// Pick the region for a run, given the ambient region value
    #[must_use]
    pub fn resolve_region(self, explicit: Option<&str>, ambient: Option<&str>) -> String {
        self.resolve_region_or(explicit, ambient, DEFAULT_REGION)
    }

    /// Like [`RunMode::resolve_region`] with a caller-chosen fallback
    #[must_use]
    pub fn resolve_region_or(
        self,
        explicit: Option<&str>,
        ambient: Option<&str>,
        fallback: &str,
    ) -> String {
        let explicit = explicit.filter(|r| !r.trim().is_empty());
        let ambient = ambient.filter(|r| !r.trim().is_empty());
        let chosen = if self.is_managed() {
            ambient
        } else {
            explicit.or(ambient)
        };
        chosen.unwrap_or(fallback).to_string()
    }

    /// Pick the region for a run, reading `AWS_DEFAULT_REGION`
    #[must_use]
    pub fn effective_region(self, explicit: Option<&str>) -> String {
        let ambient = std::env::var(AMBIENT_REGION_VAR).ok();
        self.resolve_region(explicit, ambient.as_deref())
    }

    /// Pick the profile for a run; managed runs never use one
    #[must_use]
    pub fn effective_profile(self, profile: Option<String>) -> Option<String> {
        if self.is_managed() {
            None
        } else {
            profile.filter(|p| !p.trim().is_empty())
        }
    }

    /// Whether a spawned batch command should carry `--region`
    #[must_use]
    pub const fn passes_region_in_command(self) -> bool {
        !self.is_managed()
    }

    /// Whether a spawned batch command should carry `--profile`
    #[must_use]
    pub const fn passes_profile_in_command(self, profile: Option<&str>) -> bool {
        !self.is_managed() && profile.is_some()
    }
}

impl FromStr for RunMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "poetry" => Ok(Self::Local),
            "docker" => Ok(Self::Docker),
            "ecs" => Ok(Self::Ecs),
            other => Err(Error::configuration_with_help(
                format!("Unknown run mode: {other}"),
                "Expected one of: local, docker, ecs",
            )),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Local => "local",
            Self::Docker => "docker",
            Self::Ecs => "ecs",
        };
        f.write_str(s)
    }
}

/// Per-service request limits for provider queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiLimits {
    /// Upper bound on resources collected per service
    pub max_results: usize,
    /// Page size for compute instance listing
    pub ec2_page_size: i32,
    /// Page size for database listing
    pub rds_page_size: i32,
    /// Page size for bucket listing
    pub s3_page_size: i32,
    /// Page size for function listing
    pub lambda_page_size: i32,
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_results: 1000,
            ec2_page_size: 1000,
            rds_page_size: 100,
            s3_page_size: 1000,
            lambda_page_size: 50,
        }
    }
}

impl ApiLimits {
    /// Page size for a service
    #[must_use]
    pub const fn page_size(&self, service: ServiceKind) -> i32 {
        match service {
            ServiceKind::Ec2 => self.ec2_page_size,
            ServiceKind::Rds => self.rds_page_size,
            ServiceKind::S3 => self.s3_page_size,
            ServiceKind::Lambda => self.lambda_page_size,
        }
    }
}

/// Resolved resviz settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Cache directory; platform default when unset
    pub cache_dir: Option<PathBuf>,
    /// Batch log directory; platform default when unset
    pub log_dir: Option<PathBuf>,
    /// Maximum age of a cache entry in seconds
    pub cache_ttl_secs: u64,
    /// Maximum number of provider queries in flight
    pub max_concurrency: usize,
    /// Dashboard polling interval while a job runs
    pub poll_interval_secs: u64,
    /// How the batch job is being run
    pub run_mode: RunMode,
    /// Region used when none is given
    pub default_region: String,
    /// Regions offered by the dashboard
    pub regions: Vec<String>,
    /// Credential profiles offered by the dashboard
    pub profiles: Vec<String>,
    /// Tag keys every resource is expected to carry
    pub required_tags: Vec<String>,
    /// Rough monthly cost per resource, in USD, keyed by service name
    pub estimated_costs: BTreeMap<String, f64>,
    /// Check that a `running` record's process is still alive
    pub liveness_probe: bool,
    /// Provider request limits
    pub api: ApiLimits,
}

impl Default for Settings {
    fn default() -> Self {
        let estimated_costs = [("EC2", 50.0), ("RDS", 100.0), ("S3", 5.0), ("Lambda", 1.0)]
            .into_iter()
            .map(|(service, cost)| (service.to_string(), cost))
            .collect();

        Self {
            cache_dir: None,
            log_dir: None,
            cache_ttl_secs: 86_400,
            max_concurrency: 5,
            poll_interval_secs: 5,
            run_mode: RunMode::Local,
            default_region: DEFAULT_REGION.to_string(),
            regions: vec!["us-east-1".to_string(), "ap-northeast-1".to_string()],
            profiles: vec!["sandbox".to_string(), "demo".to_string()],
            required_tags: vec!["CostProject".to_string()],
            estimated_costs,
            liveness_probe: false,
            api: ApiLimits::default(),
        }
    }
}

impl Settings {
    /// Load settings from defaults, the config file and the environment.
    ///
    /// An explicitly given file must exist; the platform default file is
    /// optional.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an
    /// environment override is malformed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut settings = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match paths::config_file() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
        Self::from_toml(&contents).map_err(|e| match e {
            Error::Configuration { message, help } => Error::Configuration {
                message: format!("{}: {message}", path.display()),
                help,
            },
            other => other,
        })
    }

    /// Parse settings from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for [`Settings`].
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::configuration(format!("Invalid settings file: {e}")))
    }

    /// Apply `RESVIZ_*` overrides using the given variable lookup
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or enum override does not parse.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = lookup("RESVIZ_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("RESVIZ_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(ttl) = lookup("RESVIZ_CACHE_TTL") {
            self.cache_ttl_secs = parse_env("RESVIZ_CACHE_TTL", &ttl)?;
        }
        if let Some(limit) = lookup("RESVIZ_MAX_CONCURRENCY") {
            self.max_concurrency = parse_env("RESVIZ_MAX_CONCURRENCY", &limit)?;
        }
        if let Some(mode) = lookup("RESVIZ_RUN_MODE") {
            self.run_mode = mode.parse()?;
        }
        if let Some(flag) = lookup("RESVIZ_LIVENESS_PROBE") {
            self.liveness_probe = matches!(flag.trim(), "1" | "true" | "yes" | "on");
        }
        Ok(())
    }

    /// Reject settings that cannot work
    ///
    /// # Errors
    ///
    /// Returns an error when the concurrency limit is zero or no region is known.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::configuration_with_help(
                "max_concurrency must be at least 1",
                "Set RESVIZ_MAX_CONCURRENCY or max_concurrency to a positive number",
            ));
        }
        if self.default_region.trim().is_empty() {
            return Err(Error::configuration("default_region must not be empty"));
        }
        Ok(())
    }

    /// Resolved cache directory
    ///
    /// # Errors
    ///
    /// Returns an error if no platform cache directory exists.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::cache_dir(),
        }
    }

    /// Resolved execution status directory
    ///
    /// # Errors
    ///
    /// Returns an error if no platform cache directory exists.
    pub fn status_dir(&self) -> Result<PathBuf> {
        Ok(paths::status_dir(&self.cache_dir()?))
    }

    /// Resolved batch log directory
    ///
    /// # Errors
    ///
    /// Returns an error if no platform state directory exists.
    pub fn log_dir(&self) -> Result<PathBuf> {
        match &self.log_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::log_dir(),
        }
    }

    /// Cache time-to-live
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Region for a run: explicit, then `AWS_DEFAULT_REGION`, then
    /// `default_region`; managed runs ignore the explicit value
    #[must_use]
    pub fn effective_region(&self, explicit: Option<&str>) -> String {
        let ambient = std::env::var(AMBIENT_REGION_VAR).ok();
        self.run_mode
            .resolve_region_or(explicit, ambient.as_deref(), &self.default_region)
    }

    /// Dashboard polling interval
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Monthly cost per resource for a service, zero when unknown
    #[must_use]
    pub fn unit_cost(&self, service: &str) -> f64 {
        self.estimated_costs.get(service).copied().unwrap_or(0.0)
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        Error::configuration(format!("Invalid value for {key} ({value}): {e}"))
    })
}
