//! Why a status record could not be read, written or removed

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for status store operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The status directory or a record file could not be accessed
    #[error("Status {operation} failed: {}", path.display())]
    #[diagnostic(code(resviz::state::io))]
    Io {
        /// Underlying filesystem error
        #[source]
        source: std::io::Error,
        /// File or directory involved
        path: PathBuf,
        /// Filesystem call that failed
        operation: &'static str,
    },

    /// A record file is not a valid status record
    #[error("Status record {} is corrupt", path.display())]
    #[diagnostic(
        code(resviz::state::corrupt_record),
        help("Corrupt records are deleted; the scope reads as not found")
    )]
    CorruptRecord {
        /// Record file that failed to decode
        path: PathBuf,
        /// Decoder error
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be encoded
    #[error("Cannot encode status record for {scope}")]
    #[diagnostic(code(resviz::state::encode))]
    Encode {
        /// Scope of the record
        scope: String,
        /// Encoder error
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn io(source: std::io::Error, path: &Path, operation: &'static str) -> Self {
        Self::Io {
            source,
            path: path.to_path_buf(),
            operation,
        }
    }
}

/// Result type alias for status store operations
pub type Result<T> = std::result::Result<T, Error>;
