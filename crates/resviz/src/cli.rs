use crate::tracing::LogLevel;
use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};
use miette::{Diagnostic, Report};
use resviz_core::ServiceKind;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;
/// Runtime failure exit code
pub const EXIT_EVAL: i32 = 3;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("CLI/configuration error: {message}")]
    #[diagnostic(code(resviz::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Other unexpected error (exit code 3)
    #[error("Unexpected error: {message}")]
    #[diagnostic(code(resviz::cli::other))]
    Other {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new other error
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new other error with help text
    #[must_use]
    pub fn other_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

/// Convert `resviz_core::Error` to the matching `CliError` variant.
///
/// Configuration and validation problems are the user's to fix (exit code
/// 2); I/O failures are runtime errors (exit code 3).
impl From<resviz_core::Error> for CliError {
    fn from(err: resviz_core::Error) -> Self {
        match err {
            // Extract just the message to avoid "Configuration error: Configuration error:"
            resviz_core::Error::Configuration { message, help } => Self::Config { message, help },
            resviz_core::Error::Validation { message } => Self::config(message),
            resviz_core::Error::Io {
                source,
                path,
                operation,
            } => {
                let path_str = path
                    .as_ref()
                    .map_or(String::new(), |p| format!(" on {}", p.display()));
                Self::other_with_help(
                    format!("I/O {operation} failed{path_str}: {source}"),
                    "Check file permissions and ensure the path exists",
                )
            }
        }
    }
}

impl From<resviz_cache::Error> for CliError {
    fn from(err: resviz_cache::Error) -> Self {
        Self::other(err.to_string())
    }
}

impl From<resviz_state::Error> for CliError {
    fn from(err: resviz_state::Error) -> Self {
        Self::other(err.to_string())
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Other { .. } => EXIT_EVAL,
    }
}

/// Render error appropriately based on JSON flag
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode {
        let error_envelope = ErrorEnvelope::new(serde_json::json!({
            "code": match err {
                CliError::Config { .. } => "config",
                CliError::Other { .. } => "other",
            },
            "message": err.to_string()
        }));

        match serde_json::to_string(&error_envelope) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        // Use miette for human-friendly error display
        let report = Report::new(err.clone());
        eprintln!("{report:?}");
        // Ensure output is flushed before potential process exit
        let _ = io::stderr().flush();
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkEnvelope<T> {
    /// Status indicator - always "ok" for success
    pub status: &'static str,
    /// The actual data payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope<E> {
    /// Status indicator - always "error" for failures
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Parse a `KEY=VALUE` tag filter
///
/// # Errors
///
/// Returns a message when the separator or the key is missing.
pub fn parse_tag_filter(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.trim().is_empty() {
        return Err(format!("tag key is empty in '{s}'"));
    }
    Ok((key.trim().to_string(), value.trim().to_string()))
}

/// Cloud resource inventory with cached batch fetches.
#[derive(Parser, Debug)]
#[command(name = "resviz")]
#[command(about = "Cloud resource inventory with cached batch fetches and tag compliance checks")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    /// Emit JSON envelope regardless of format.
    #[arg(long, global = true, help = "Emit JSON envelope regardless of format")]
    pub json: bool,

    /// Settings file.
    #[arg(long, global = true, value_name = "FILE", help = "Path to a settings file")]
    pub config: Option<PathBuf>,
}

/// Services, region and profile shared by several commands.
#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeArgs {
    /// Services to include (repeatable; all when omitted).
    #[arg(
        long = "services",
        short = 's',
        action = clap::ArgAction::Append,
        value_parser = PossibleValuesParser::new(ServiceKind::NAMES),
        help = "Service to include (repeatable, default: all)"
    )]
    pub services: Vec<String>,

    /// Region to query.
    #[arg(long, short = 'r', help = "AWS region (default: AWS_DEFAULT_REGION or settings)")]
    pub region: Option<String>,

    /// Credential profile.
    #[arg(long, short = 'p', help = "AWS profile (ignored in managed run mode)")]
    pub profile: Option<String>,
}

impl ScopeArgs {
    /// Requested services, or every supported service
    #[must_use]
    pub fn services_or_all(&self) -> Vec<String> {
        if self.services.is_empty() {
            ServiceKind::all_names()
        } else {
            self.services.clone()
        }
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one batch fetch (prints a JSON result, exits 0 or 1).
    #[command(about = "Run one batch fetch and print a JSON result")]
    Fetch {
        /// Scope of the fetch.
        #[command(flatten)]
        scope: ScopeArgs,
        /// Clear cached data for the scope first.
        #[arg(long, help = "Clear cached data for all services in the scope first")]
        clear_cache: bool,
        /// Run even if a job is recorded as running.
        #[arg(long, help = "Run even if a job for the scope is recorded as running")]
        force: bool,
    },
    /// Reuse cached data or start a background fetch.
    #[command(about = "Reuse cached data or start a background fetch")]
    Refresh {
        /// Scope of the refresh.
        #[command(flatten)]
        scope: ScopeArgs,
        /// Start a fetch even when the cache is valid.
        #[arg(long, help = "Start a fetch even when the cache is valid")]
        clear_cache: bool,
        /// Start a fetch even if one is recorded as running.
        #[arg(long, help = "Start a fetch even if one is recorded as running")]
        force: bool,
    },
    /// Show inventory, tag compliance and cost, polling while a fetch runs.
    #[command(about = "Show inventory, tag compliance and cost estimates")]
    Dashboard {
        /// Scope to show.
        #[command(flatten)]
        scope: ScopeArgs,
        /// Start a fresh fetch.
        #[arg(long, help = "Start a fresh fetch instead of reusing the cache")]
        refresh: bool,
        /// Clear cached data when refreshing.
        #[arg(long, requires = "refresh", help = "Bypass the cache when refreshing")]
        clear_cache: bool,
        /// Tag filters.
        #[arg(
            long = "tag",
            short = 't',
            action = clap::ArgAction::Append,
            value_parser = parse_tag_filter,
            value_name = "KEY=VALUE",
            help = "Only show resources with this tag (repeatable)"
        )]
        tags: Vec<(String, String)>,
        /// Page of rows to show per service.
        #[arg(long, default_value_t = 1, help = "Page of rows to show per service")]
        page: usize,
        /// Rows per page.
        #[arg(long, default_value_t = 20, help = "Rows per page")]
        page_size: usize,
        /// Do not wait for a running fetch.
        #[arg(long, help = "Render once without waiting for a running fetch")]
        no_wait: bool,
    },
    /// Show or clear execution status records.
    #[command(about = "Show or clear execution status records")]
    Status {
        /// Region of the record.
        #[arg(long, short = 'r', help = "AWS region")]
        region: Option<String>,
        /// Profile of the record.
        #[arg(long, short = 'p', help = "AWS profile")]
        profile: Option<String>,
        /// Remove every status record.
        #[arg(long, help = "Remove every status record")]
        clear: bool,
    },
    /// Inspect or clear the inventory cache.
    #[command(about = "Inspect or clear the inventory cache")]
    Cache {
        /// Cache subcommand to execute.
        #[command(subcommand)]
        subcommand: CacheCommands,
    },
}

/// Cache subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheCommands {
    /// Validity and timestamps for a scope.
    #[command(about = "Show cache validity for a scope")]
    Info {
        /// Scope to inspect.
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Number of files and bytes in the cache.
    #[command(about = "Show cache size")]
    Size,
    /// Remove one entry, or everything.
    #[command(about = "Remove one cache entry, or all entries")]
    Clear {
        /// Service of the entry.
        #[arg(
            long,
            requires = "region",
            value_parser = PossibleValuesParser::new(ServiceKind::NAMES),
            help = "Service of the entry to remove (requires --region)"
        )]
        service: Option<String>,
        /// Region of the entry.
        #[arg(long, requires = "service", help = "Region of the entry to remove")]
        region: Option<String>,
        /// Profile of the entry.
        #[arg(long, requires = "service", help = "Profile of the entry to remove")]
        profile: Option<String>,
    },
}

/// Parse command line arguments into CLI structure
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(EXIT_OK, 0);
        assert_eq!(exit_code_for(&CliError::config("bad")), EXIT_CLI);
        assert_eq!(exit_code_for(&CliError::other("boom")), EXIT_EVAL);
    }

    #[test]
    fn test_fetch_parses_repeated_services() {
        let cli = Cli::try_parse_from([
            "resviz",
            "fetch",
            "--services",
            "EC2",
            "--services",
            "Lambda",
            "--region",
            "us-east-1",
            "--profile",
            "sandbox",
            "--force",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Fetch {
                scope,
                clear_cache,
                force,
            }) => {
                assert_eq!(scope.services, vec!["EC2", "Lambda"]);
                assert_eq!(scope.region.as_deref(), Some("us-east-1"));
                assert_eq!(scope.profile.as_deref(), Some("sandbox"));
                assert!(!clear_cache);
                assert!(force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_fetch_rejects_unknown_service() {
        assert!(Cli::try_parse_from(["resviz", "fetch", "--services", "DynamoDB"]).is_err());
    }

    #[test]
    fn test_services_default_to_all() {
        assert_eq!(ScopeArgs::default().services_or_all(), ServiceKind::all_names());
    }

    #[test]
    fn test_partial_cache_clear_is_rejected() {
        assert!(Cli::try_parse_from(["resviz", "cache", "clear", "--service", "EC2"]).is_err());
        assert!(Cli::try_parse_from(["resviz", "cache", "clear", "--region", "us-east-1"]).is_err());
        assert!(
            Cli::try_parse_from([
                "resviz",
                "cache",
                "clear",
                "--service",
                "EC2",
                "--region",
                "us-east-1"
            ])
            .is_ok()
        );
        assert!(Cli::try_parse_from(["resviz", "cache", "clear"]).is_ok());
    }

    #[test]
    fn test_tag_filter_parsing() {
        assert_eq!(
            parse_tag_filter("CostProject=alpha").unwrap(),
            ("CostProject".to_string(), "alpha".to_string())
        );
        assert_eq!(
            parse_tag_filter("Env=").unwrap(),
            ("Env".to_string(), String::new())
        );
        assert!(parse_tag_filter("novalue").is_err());
        assert!(parse_tag_filter("=x").is_err());
    }

    #[test]
    fn test_core_configuration_error_maps_to_config_exit() {
        let err: CliError = resviz_core::Error::configuration("bad ttl").into();
        assert_eq!(exit_code_for(&err), EXIT_CLI);
        assert!(err.to_string().contains("bad ttl"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["resviz", "status", "--json", "-L", "debug"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.level, LogLevel::Debug));
    }
}
