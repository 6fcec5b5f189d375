//! Execution status records for resviz
//!
//! A batch job and any number of frontends coordinate through one small JSON
//! file per (region, profile). The file holds the latest lifecycle state of
//! the job for that scope; writing a new state replaces the old one.
//!
//! This is a shared status board on a single host, not a lock: callers read,
//! decide, then write, and concurrent writers race with last-writer-wins.

mod error;
pub mod liveness;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use store::StatusStore;
pub use types::{JobState, RunSummary, StatusKind, StatusRecord};
