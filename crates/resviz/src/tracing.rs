//! Tracing configuration for the resviz CLI
//!
//! Structured logs go to stderr in one of several formats. The batch job
//! additionally writes plain-text logs to a daily rotated file so a detached
//! run leaves a trace behind.

use std::io;
use std::path::{Path, PathBuf};
pub use tracing::Level;
use tracing::Subscriber;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Batch log files are named `batch_execution.YYYY-MM-DD.log`
pub const BATCH_LOG_PREFIX: &str = "batch_execution";

/// Extension of batch log files
pub const BATCH_LOG_SUFFIX: &str = "log";

/// Daily batch log files kept before the oldest is deleted
pub const BATCH_LOG_RETENTION: usize = 7;

/// Tracing output format options
#[derive(Debug, Clone, clap::ValueEnum)]
pub enum TracingFormat {
    /// Pretty-printed human-readable format
    Pretty,
    /// Compact single-line format
    Compact,
    /// Structured JSON format
    Json,
    /// Development format with extra context
    Dev,
}

/// Log level options for CLI
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogLevel {
    /// Show all logs (trace level)
    Trace,
    /// Show debug and above
    Debug,
    /// Show info and above
    Info,
    /// Show warnings and above (default)
    Warn,
    /// Show errors only
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

impl std::str::FromStr for TracingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            "dev" => Ok(Self::Dev),
            _ => Err(format!("Unknown tracing format: {s}")),
        }
    }
}

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Output format on stderr
    pub format: TracingFormat,
    /// Minimum level when `RUST_LOG` is unset
    pub level: Level,
    /// Explicit filter directive, overriding `level` and `RUST_LOG`
    pub filter: Option<String>,
    /// Directory for the rotated batch log, in addition to stderr
    pub log_dir: Option<PathBuf>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: TracingFormat::Compact,
            level: Level::WARN,
            filter: None,
            log_dir: None,
        }
    }
}

static CORRELATION_ID: std::sync::OnceLock<Uuid> = std::sync::OnceLock::new();

/// Get or create a correlation ID for the current process
pub fn correlation_id() -> Uuid {
    *CORRELATION_ID.get_or_init(Uuid::new_v4)
}

const fn level_str(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Default filter covering every resviz crate at one level
#[must_use]
pub fn default_filter(level: Level) -> String {
    let l = level_str(level);
    format!(
        "resviz={l},resviz_core={l},resviz_cache={l},resviz_state={l},resviz_fetch={l},resviz_aws={l}"
    )
}

/// Daily rotated batch log in `dir`, keeping [`BATCH_LOG_RETENTION`] files
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the current log
/// file cannot be opened.
pub fn batch_log_appender(dir: &Path) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(BATCH_LOG_PREFIX)
        .filename_suffix(BATCH_LOG_SUFFIX)
        .max_log_files(BATCH_LOG_RETENTION)
        .build(dir)
}

fn batch_log_layer<S>(appender: RollingFileAppender) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(appender)
}

/// Initialize tracing with the given configuration
///
/// # Errors
///
/// Returns an error if the filter is invalid or a subscriber is already set.
/// A batch log that cannot be opened is reported on stderr and skipped.
pub fn init_tracing(config: TracingConfig) -> miette::Result<()> {
    let correlation_id = correlation_id();

    let env_filter = if let Some(filter) = config.filter {
        EnvFilter::try_new(filter)
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter(config.level)))
    }
    .map_err(|e| miette::miette!("Failed to create tracing filter: {e}"))?;

    let file_layer = match config.log_dir.as_deref().map(batch_log_appender) {
        Some(Ok(appender)) => Some(batch_log_layer(appender)),
        Some(Err(e)) => {
            // Subscriber is not installed yet
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Warning: batch log file unavailable: {e}");
            }
            None
        }
        None => None,
    };

    let registry = tracing_subscriber::registry().with(env_filter).with(file_layer);

    match config.format {
        TracingFormat::Pretty => {
            let layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(io::stderr)
                .with_target(true);
            registry
                .with(layer)
                .try_init()
                .map_err(|e| miette::miette!("{e}"))?;
        }
        TracingFormat::Compact => {
            let layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(io::stderr)
                .with_target(false);
            registry
                .with(layer)
                .try_init()
                .map_err(|e| miette::miette!("{e}"))?;
        }
        TracingFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_current_span(true)
                .with_span_list(true);
            registry
                .with(layer)
                .try_init()
                .map_err(|e| miette::miette!("{e}"))?;
        }
        TracingFormat::Dev => {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true);
            registry
                .with(layer)
                .try_init()
                .map_err(|e| miette::miette!("{e}"))?;
        }
    }

    tracing::info!(
        correlation_id = %correlation_id,
        version = env!("CARGO_PKG_VERSION"),
        format = ?config.format,
        "Tracing initialized for resviz"
    );

    Ok(())
}
