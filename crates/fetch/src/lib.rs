//! Inventory fetch pipeline for resviz
//!
//! For each requested service the pipeline serves a live cache entry when
//! there is one and otherwise queries the provider, caching non-empty
//! results. At most `max_concurrency` services are fetched at once. The
//! first failure aborts the whole batch.

mod error;
pub mod pipeline;

pub use error::{FetchError, Result};
pub use pipeline::{DEFAULT_MAX_CONCURRENCY, Fetcher};
