//! Error types for the fetch pipeline

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use resviz_core::ProviderError;
use thiserror::Error;

/// Why a fetch did not produce a dataset
#[derive(Error, Debug, Diagnostic)]
pub enum FetchError {
    /// A provider query failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Provider(#[from] ProviderError),

    /// A fetch task ended without a result
    #[error("Fetch task did not complete: {message}")]
    #[diagnostic(code(resviz::fetch::task))]
    Task {
        /// Reason reported by the runtime
        message: String,
    },
}

impl FetchError {
    /// Create a task error
    #[must_use]
    pub fn task(message: impl Into<String>) -> Self {
        Self::Task {
            message: message.into(),
        }
    }

    /// Whether the failure is an authentication problem
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Provider(e) if e.is_auth())
    }
}

/// Result type for fetch operations
pub type Result<T> = std::result::Result<T, FetchError>;
