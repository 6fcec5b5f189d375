//! File-backed store of execution status records

use crate::liveness;
use crate::types::{JobState, RunSummary, StatusRecord};
use crate::{Error, Result};
use chrono::Utc;
use resviz_core::{Scope, file_name_part};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

const RECORD_PREFIX: &str = "status_";
const RECORD_EXTENSION: &str = "json";

/// Reads and writes one status record per (region, profile)
///
/// Write failures are logged and swallowed: a lost write only weakens
/// duplicate detection for the next run.
#[derive(Debug, Clone)]
pub struct StatusStore {
    dir: PathBuf,
    liveness_probe: bool,
}

impl StatusStore {
    /// Create a store rooted at `dir`; the directory is created on first write
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            liveness_probe: false,
        }
    }

    /// Verify that a `running` record's process still exists before
    /// trusting it in [`StatusStore::is_running`]
    #[must_use]
    pub const fn with_liveness_probe(mut self, enabled: bool) -> Self {
        self.liveness_probe = enabled;
        self
    }

    /// Directory holding the record files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for a scope, `status_{profile}_{region}.json`
    #[must_use]
    pub fn record_path(&self, scope: &Scope) -> PathBuf {
        self.dir.join(format!(
            "{RECORD_PREFIX}{}_{}.{RECORD_EXTENSION}",
            file_name_part(scope.profile_key()),
            file_name_part(&scope.region)
        ))
    }

    /// Current record for a scope; `None` means not found
    ///
    /// A record that cannot be decoded is deleted and reported as not found.
    pub async fn info(&self, scope: &Scope) -> Option<StatusRecord> {
        let path = self.record_path(scope);
        match self.load(&path).await {
            Ok(record) => record,
            Err(e) => {
                warn!(scope = %scope, error = %e, "Removing unreadable status record");
                if let Err(e) = fs::remove_file(&path).await
                    && e.kind() != ErrorKind::NotFound
                {
                    warn!(path = %path.display(), error = %e, "Failed to remove status record");
                }
                None
            }
        }
    }

    /// Whether the record for a scope is `running`
    ///
    /// With the liveness probe enabled, a record whose process is gone from
    /// this host is reported as not running. The record itself is left for
    /// the next `start` to overwrite.
    pub async fn is_running(&self, scope: &Scope) -> bool {
        let Some(record) = self.info(scope).await else {
            return false;
        };
        let JobState::Running { pid, host, .. } = &record.state else {
            return false;
        };

        if self.liveness_probe && is_local(host.as_deref()) && !liveness::process_alive(*pid) {
            warn!(scope = %scope, pid, "Ignoring running record of a process that no longer exists");
            return false;
        }
        true
    }

    /// Record that a job started; overwrites whatever was there
    pub async fn start(&self, services: &[String], scope: &Scope, pid: u32) {
        let state = JobState::Running {
            start_time: Utc::now(),
            pid,
            host: liveness::host_name(),
        };
        self.put(services, scope, state).await;
        info!(scope = %scope, pid, "Execution started");
    }

    /// Record that the job finished successfully
    pub async fn finish_success(&self, services: &[String], scope: &Scope, result: RunSummary) {
        let state = JobState::Completed {
            end_time: Utc::now(),
            result,
        };
        self.put(services, scope, state).await;
        info!(scope = %scope, "Execution completed");
    }

    /// Record that the job failed
    pub async fn finish_failure(&self, services: &[String], scope: &Scope, error: &str) {
        let state = JobState::Failed {
            end_time: Utc::now(),
            error: error.to_string(),
        };
        self.put(services, scope, state).await;
        warn!(scope = %scope, error, "Execution failed");
    }

    /// Delete every status record, returning how many were removed
    pub async fn clear_all(&self) -> Result<usize> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::io(e, &self.dir, "read_dir")),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io(e, &self.dir, "read_dir"))?
        {
            let path = entry.path();
            if !is_record_file(&path) {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(e, &path, "remove_file")),
            }
        }

        debug!(removed, "Cleared status records");
        Ok(removed)
    }

    async fn put(&self, services: &[String], scope: &Scope, state: JobState) {
        let record = StatusRecord {
            services: services.to_vec(),
            region: scope.region.clone(),
            profile: scope.profile.clone(),
            state,
        };
        if let Err(e) = self.save(scope, &record).await {
            warn!(scope = %scope, error = %e, "Failed to write status record");
        }
    }

    async fn save(&self, scope: &Scope, record: &StatusRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::io(e, &self.dir, "create_dir_all"))?;

        let json = serde_json::to_string_pretty(record).map_err(|source| Error::Encode {
            scope: scope.to_string(),
            source,
        })?;

        // Write beside the target and rename over it so readers never see a
        // partially written record
        let path = self.record_path(scope);
        let tmp = path.with_extension(format!("{RECORD_EXTENSION}.{}.tmp", std::process::id()));
        fs::write(&tmp, json)
            .await
            .map_err(|e| Error::io(e, &tmp, "write"))?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(Error::io(e, &path, "rename"));
        }

        debug!(path = %path.display(), status = %record.kind(), "Saved status record");
        Ok(())
    }

    async fn load(&self, path: &Path) -> Result<Option<StatusRecord>> {
        let json = match fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(e, path, "read_to_string")),
        };

        let record = serde_json::from_str(&json).map_err(|source| Error::CorruptRecord {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(record))
    }
}

fn is_record_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.starts_with(RECORD_PREFIX)
        && path.extension().and_then(|ext| ext.to_str()) == Some(RECORD_EXTENSION)
}

fn is_local(host: Option<&str>) -> bool {
    match (host, liveness::host_name()) {
        (Some(recorded), Some(current)) => recorded == current,
        _ => true,
    }
}
