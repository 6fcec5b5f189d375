//! File-backed inventory cache for resviz
//!
//! One JSON file per (service, region, profile) holds the rows of the last
//! successful fetch. There is no stored timestamp: an entry's age is the age
//! of its file, so expiry survives process restarts without a sweeper.
//!
//! # Expiry
//!
//! Expired entries are removed lazily by the read that notices them. The
//! "check age, then evict or return" sequence is two separate filesystem
//! operations and is not atomic; two readers racing at the TTL boundary may
//! both evict, which is harmless because writes replace whole files.
//!
//! # Async callers
//!
//! The store does blocking filesystem I/O. Code running on the tokio runtime
//! uses [`CacheStore::load`], [`CacheStore::store`] and [`CacheStore::remove`],
//! which run the same operations on the blocking thread pool.

mod error;
pub mod store;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use store::{CacheKey, CacheSize, CacheStore, CacheSummary, ClearScope, EntryInfo};
