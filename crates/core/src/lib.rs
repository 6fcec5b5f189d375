// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

//! Core types for resviz
//!
//! This crate provides the shared vocabulary of the resviz workspace:
//! - [`ServiceKind`] and [`Scope`] identify what is fetched and where
//! - [`Dataset`], [`Row`] and [`Cell`] carry tabular inventory data
//! - [`InventoryProvider`] is the seam provider crates implement
//! - [`Settings`] resolves configuration from defaults, TOML and environment
//! - [`inventory`] holds tag compliance, filtering and cost helpers

pub mod config;
pub mod dataset;
pub mod inventory;
pub mod paths;
pub mod provider;
pub mod service;

pub use config::{ApiLimits, RunMode, Settings};
pub use dataset::{Cell, Dataset, Row};
pub use inventory::ServiceData;
pub use provider::{InventoryProvider, ProviderError};
pub use service::{DEFAULT_PROFILE, Scope, ServiceKind, file_name_part};

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Main error type for resviz core operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Settings could not be resolved or are invalid
    #[error("Configuration error: {message}")]
    #[diagnostic(code(resviz::config::invalid))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },

    /// I/O error with path context
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(resviz::io::error),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "create")
        operation: String,
    },

    /// Input that does not name a known value
    #[error("Validation failed: {message}")]
    #[diagnostic(code(resviz::validation::failed))]
    Validation {
        /// Error message describing the validation failure
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text
    #[must_use]
    pub fn configuration_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            path: None,
            operation: "unknown".to_string(),
        }
    }
}

/// Result type alias for resviz operations
pub type Result<T> = std::result::Result<T, Error>;
