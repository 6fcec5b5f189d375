//! Platform-appropriate locations for resviz data.
//!
//! | Platform | Cache Dir | Log Dir | Config File |
//! |----------|-----------|---------|-------------|
//! | **macOS** | `~/Library/Caches/resviz` | `~/Library/Application Support/resviz/logs` | `~/Library/Application Support/resviz/config.toml` |
//! | **Linux** | `~/.cache/resviz` (XDG_CACHE_HOME) | `~/.local/state/resviz/logs` (XDG_STATE_HOME) | `~/.config/resviz/config.toml` |
//! | **Windows** | `%LOCALAPPDATA%\resviz` | `%APPDATA%\resviz\logs` | `%APPDATA%\resviz\config.toml` |
//!
//! Environment variable overrides for testing and containers:
//! - `RESVIZ_CACHE_DIR` - Override cache directory
//! - `RESVIZ_LOG_DIR` - Override log directory
//! - `RESVIZ_CONFIG` - Override config file

use crate::{Error, Result};
use std::path::PathBuf;

/// Subdirectory of the cache dir that holds execution status records
pub const STATUS_SUBDIR: &str = "status";

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var(var)
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
}

/// Get the cache directory for resviz.
///
/// Cache data includes one JSON file per (service, region, profile) and the
/// `status/` directory of execution records.
///
/// Resolution order:
/// 1. `RESVIZ_CACHE_DIR` environment variable
/// 2. Platform cache directory + `/resviz`
///
/// # Errors
///
/// Returns an error if the cache directory cannot be determined.
pub fn cache_dir() -> Result<PathBuf> {
    if let Some(dir) = env_path("RESVIZ_CACHE_DIR") {
        return Ok(dir);
    }

    let base = dirs::cache_dir()
        .ok_or_else(|| Error::configuration("Could not determine cache directory"))?;

    Ok(base.join("resviz"))
}

/// Get the directory holding batch job logs.
///
/// Resolution order:
/// 1. `RESVIZ_LOG_DIR` environment variable
/// 2. Platform state directory (data directory on macOS/Windows) + `/resviz/logs`
///
/// # Errors
///
/// Returns an error if no base directory can be determined.
pub fn log_dir() -> Result<PathBuf> {
    if let Some(dir) = env_path("RESVIZ_LOG_DIR") {
        return Ok(dir);
    }

    // state_dir() is None on macOS/Windows
    let base = dirs::state_dir()
        .or_else(dirs::data_dir)
        .ok_or_else(|| Error::configuration("Could not determine state directory"))?;

    Ok(base.join("resviz").join("logs"))
}

/// Get the path of the optional settings file.
///
/// Resolution order:
/// 1. `RESVIZ_CONFIG` environment variable
/// 2. Platform config directory + `/resviz/config.toml`
///
/// Returns `None` when neither can be determined; the file itself may not exist.
#[must_use]
pub fn config_file() -> Option<PathBuf> {
    env_path("RESVIZ_CONFIG")
        .or_else(|| dirs::config_dir().map(|base| base.join("resviz").join("config.toml")))
}

/// Get the execution status directory below a cache directory.
#[must_use]
pub fn status_dir(cache_dir: &std::path::Path) -> PathBuf {
    cache_dir.join(STATUS_SUBDIR)
}
