//! Lifecycle records persisted per (region, profile)

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a successful batch run
///
/// Also the success payload the batch job prints on stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Always `true` for a recorded summary
    pub success: bool,
    /// Services requested
    pub services: Vec<String>,
    /// Region the run covered
    pub region: String,
    /// Services that returned at least one row
    pub success_count: usize,
    /// Services fetched
    pub total_count: usize,
    /// Row count per service, in request order
    pub results: IndexMap<String, usize>,
}

impl RunSummary {
    /// Build a summary from per-service row counts
    #[must_use]
    pub fn from_counts(
        services: Vec<String>,
        region: impl Into<String>,
        results: IndexMap<String, usize>,
    ) -> Self {
        Self {
            success: true,
            success_count: results.values().filter(|count| **count > 0).count(),
            total_count: results.len(),
            services,
            region: region.into(),
            results,
        }
    }
}

/// Lifecycle state of the job for one scope
///
/// "Not found" is the absence of a record and has no variant here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    /// A job has started and not yet finished
    Running {
        /// When the job started
        start_time: DateTime<Utc>,
        /// Process id of the job
        pid: u32,
        /// Host the job runs on
        #[serde(default, skip_serializing_if = "Option::is_none")]
        host: Option<String>,
    },
    /// The last job finished successfully
    Completed {
        /// When the job finished
        end_time: DateTime<Utc>,
        /// What it fetched
        result: RunSummary,
    },
    /// The last job failed
    Failed {
        /// When the job failed
        end_time: DateTime<Utc>,
        /// Why it failed
        error: String,
    },
}

/// The persisted record for one (region, profile)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Services the job was asked for
    pub services: Vec<String>,
    /// Region of the record
    pub region: String,
    /// Profile of the record; absent in managed runs
    #[serde(default)]
    pub profile: Option<String>,
    /// Current lifecycle state
    #[serde(flatten)]
    pub state: JobState,
}

impl StatusRecord {
    /// Kind of the contained state
    #[must_use]
    pub const fn kind(&self) -> StatusKind {
        match self.state {
            JobState::Running { .. } => StatusKind::Running,
            JobState::Completed { .. } => StatusKind::Completed,
            JobState::Failed { .. } => StatusKind::Failed,
        }
    }

    /// Error message of a failed record
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            JobState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// When a terminal record was written
    #[must_use]
    pub const fn end_time(&self) -> Option<DateTime<Utc>> {
        match self.state {
            JobState::Completed { end_time, .. } | JobState::Failed { end_time, .. } => {
                Some(end_time)
            }
            JobState::Running { .. } => None,
        }
    }

    /// Process id of a running record
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        match self.state {
            JobState::Running { pid, .. } => Some(pid),
            _ => None,
        }
    }
}

/// The four observable states of a scope, including "no record"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// No record exists
    NotFound,
    /// A job is running
    Running,
    /// The last job completed
    Completed,
    /// The last job failed
    Failed,
}

impl StatusKind {
    /// Kind of an optional record
    #[must_use]
    pub fn of(record: Option<&StatusRecord>) -> Self {
        record.map_or(Self::NotFound, StatusRecord::kind)
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not_found",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}
