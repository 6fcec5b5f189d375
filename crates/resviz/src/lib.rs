// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

//! resviz - cloud resource inventory with cached batch fetches
//!
//! The library half of the `resviz` binary. Two roles share one executable:
//!
//! - the **batch job** (`resviz fetch`, see [`batch`]) queries the provider
//!   for a (region, profile), fills the cache and records its lifecycle in
//!   the status store;
//! - the **frontends** (`resviz refresh`, `resviz dashboard`) go through the
//!   [`coordinator`], which reuses the cache when it can and otherwise
//!   launches the batch job as a detached process and polls its status.
//!
//! The two never talk directly. The status store and the cache on disk are
//! the only shared state, so any number of frontends can watch one job.

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

/// The guarded batch job.
pub mod batch;
/// CLI argument parsing and exit codes.
pub mod cli;
/// Command implementations.
pub mod commands;
/// Refresh decisions and detached job launches.
pub mod coordinator;
/// Text dashboard over the coordinator.
pub mod dashboard;
/// Tracing and logging configuration.
pub mod tracing;
/// Frontend view state.
pub mod view;

pub use batch::{BatchJob, BatchReport, BatchRequest};
pub use coordinator::{Coordinator, JobLauncher, Outcome, ProcessLauncher, RefreshRequest};
pub use view::{AppState, ViewState};
