//! Why a cache entry could not be read, written or removed

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for cache operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The cache directory or an entry file could not be accessed
    #[error("Cache {operation} failed: {}", path.display())]
    #[diagnostic(
        code(resviz::cache::io),
        help("Check that the cache directory is writable, or point RESVIZ_CACHE_DIR elsewhere")
    )]
    Io {
        /// Underlying filesystem error
        #[source]
        source: std::io::Error,
        /// File or directory involved
        path: PathBuf,
        /// Filesystem call that failed
        operation: &'static str,
    },

    /// An entry file does not hold a JSON array of rows
    #[error("Cache entry {key} is corrupt")]
    #[diagnostic(
        code(resviz::cache::corrupt_entry),
        help("The entry is discarded and fetched again on the next run")
    )]
    CorruptEntry {
        /// Entry that failed to decode
        key: String,
        /// Decoder error
        #[source]
        source: serde_json::Error,
    },

    /// A dataset could not be encoded for storage
    #[error("Cannot encode {rows} rows for cache entry {key}")]
    #[diagnostic(code(resviz::cache::encode))]
    Encode {
        /// Entry being written
        key: String,
        /// Size of the rejected dataset
        rows: usize,
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

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;
