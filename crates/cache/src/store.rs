//! Cache entries keyed by (service, region, profile)

use crate::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use resviz_core::{DEFAULT_PROFILE, Dataset, Scope, file_name_part};
use serde::Serialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

const ENTRY_EXTENSION: &str = "json";

/// Identifies one cache entry
///
/// Derivation is a pure function of its three inputs. An absent profile
/// maps to the `"default"` sentinel, so `None` and `Some("default")` name
/// the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    service: String,
    region: String,
    profile: String,
}

impl CacheKey {
    /// Derive a key from its parts
    #[must_use]
    pub fn new(service: &str, region: &str, profile: Option<&str>) -> Self {
        Self {
            service: file_name_part(service),
            region: file_name_part(region),
            profile: file_name_part(profile.unwrap_or(DEFAULT_PROFILE)),
        }
    }

    /// Derive the key of a service within a scope
    #[must_use]
    pub fn for_scope(service: &str, scope: &Scope) -> Self {
        Self::new(service, &scope.region, scope.profile.as_deref())
    }

    /// Service part of the key
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// File name of the entry, `{service}_{region}_{profile}.json`
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}.{ENTRY_EXTENSION}",
            self.service, self.region, self.profile
        )
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.service, self.region, self.profile)
    }
}

/// What to remove in [`CacheStore::clear`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearScope {
    /// Every entry under management
    All,
    /// Exactly one entry
    Entry(CacheKey),
}

/// Validity timestamps of a live entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    /// When the entry was written
    pub fetched_at: DateTime<Utc>,
    /// When the entry stops being served
    pub expires_at: DateTime<Utc>,
}

/// Aggregate validity of a set of services within a scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSummary {
    /// Services with a live entry
    pub valid_count: usize,
    /// Services asked about
    pub total_count: usize,
    /// Whether any of them has a live entry
    pub has_any: bool,
    /// Most recent write among live entries
    pub latest_fetch_time: Option<DateTime<Utc>>,
    /// Soonest expiry among live entries
    pub earliest_expire_time: Option<DateTime<Utc>>,
}

/// Disk usage of the cache directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheSize {
    /// Number of entry files
    pub file_count: usize,
    /// Combined size of the entry files
    pub total_bytes: u64,
}

impl CacheSize {
    /// Combined size in megabytes
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn total_megabytes(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// File-backed cache of inventory datasets
///
/// Holds no in-process locks; every write is an atomic replace of the
/// whole entry file.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at `dir`; the directory is created on first write
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the entry files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing an entry
    #[must_use]
    pub fn path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Return the dataset if the entry is younger than `ttl`
    ///
    /// An expired entry is removed. An entry that cannot be read or decoded
    /// is removed as well and reported as a miss.
    #[must_use]
    pub fn get(&self, key: &CacheKey, ttl: Duration) -> Option<Dataset> {
        let path = self.path(key);
        self.live_mtime(&path, ttl)?;

        let decoded = fs::read(&path)
            .map_err(|e| Error::io(e, &path, "read"))
            .and_then(|bytes| {
                serde_json::from_slice::<Dataset>(&bytes).map_err(|source| Error::CorruptEntry {
                    key: key.to_string(),
                    source,
                })
            });

        match decoded {
            Ok(dataset) => {
                debug!(key = %key, rows = dataset.len(), "Cache hit");
                Some(dataset)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                evict(&path);
                None
            }
        }
    }

    /// Persist a dataset, replacing any previous entry for the key
    ///
    /// Failures are logged and reported as `false`.
    pub fn set(&self, key: &CacheKey, dataset: &Dataset) -> bool {
        let written = encode(key, dataset).and_then(|json| self.write(key, &json));
        report_write(key, dataset.len(), written)
    }

    /// [`CacheStore::get`] with the file I/O moved to the blocking pool
    pub async fn load(&self, key: &CacheKey, ttl: Duration) -> Option<Dataset> {
        let store = self.clone();
        let task_key = key.clone();
        match tokio::task::spawn_blocking(move || store.get(&task_key, ttl)).await {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read task failed");
                None
            }
        }
    }

    /// [`CacheStore::set`] with the file I/O moved to the blocking pool
    pub async fn store(&self, key: &CacheKey, dataset: &Dataset) -> bool {
        let json = match encode(key, dataset) {
            Ok(json) => json,
            Err(e) => return report_write(key, dataset.len(), Err(e)),
        };
        let store = self.clone();
        let task_key = key.clone();
        let written = tokio::task::spawn_blocking(move || store.write(&task_key, &json))
            .await
            .unwrap_or_else(|e| Err(Error::io(std::io::Error::other(e), &self.path(key), "write")));
        report_write(key, dataset.len(), written)
    }

    /// Remove one entry on the blocking pool, returning how many files went
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the entry exists but cannot be deleted.
    pub async fn remove(&self, key: &CacheKey) -> Result<usize> {
        let store = self.clone();
        let scope = ClearScope::Entry(key.clone());
        tokio::task::spawn_blocking(move || store.clear(&scope))
            .await
            .unwrap_or_else(|e| {
                Err(Error::io(std::io::Error::other(e), &self.path(key), "remove_file"))
            })
    }

    fn write(&self, key: &CacheKey, json: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(e, &self.dir, "create_dir_all"))?;

        // Same directory so the final rename stays on one filesystem
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| Error::io(e, &self.dir, "create_temp"))?;
        tmp.write_all(json)
            .map_err(|e| Error::io(e, tmp.path(), "write"))?;

        let path = self.path(key);
        tmp.persist(&path)
            .map_err(|e| Error::io(e.error, &path, "persist"))?;
        Ok(())
    }

    /// Remove entries, returning how many files were deleted
    ///
    /// A missing entry or directory counts as nothing to remove.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be listed or an entry
    /// file cannot be deleted.
    pub fn clear(&self, scope: &ClearScope) -> Result<usize> {
        match scope {
            ClearScope::Entry(key) => {
                let path = self.path(key);
                match fs::remove_file(&path) {
                    Ok(()) => Ok(1),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
                    Err(e) => Err(Error::io(e, &path, "remove_file")),
                }
            }
            ClearScope::All => {
                let mut removed = 0;
                for (path, _) in self.entry_files()? {
                    match fs::remove_file(&path) {
                        Ok(()) => removed += 1,
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(Error::io(e, &path, "remove_file")),
                    }
                }
                debug!(removed, dir = %self.dir.display(), "Cleared cache");
                Ok(removed)
            }
        }
    }

    /// Validity timestamps of an entry without reading its rows
    ///
    /// Expired entries are removed, exactly as in [`CacheStore::get`].
    #[must_use]
    pub fn probe(&self, key: &CacheKey, ttl: Duration) -> Option<EntryInfo> {
        let modified = self.live_mtime(&self.path(key), ttl)?;
        let fetched_at = DateTime::<Utc>::from(modified);
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| fetched_at.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Some(EntryInfo {
            fetched_at,
            expires_at,
        })
    }

    /// Aggregate validity of `services` within `scope`
    #[must_use]
    pub fn summary(&self, services: &[String], scope: &Scope, ttl: Duration) -> CacheSummary {
        let live: Vec<EntryInfo> = services
            .iter()
            .filter_map(|service| self.probe(&CacheKey::for_scope(service, scope), ttl))
            .collect();

        CacheSummary {
            valid_count: live.len(),
            total_count: services.len(),
            has_any: !live.is_empty(),
            latest_fetch_time: live.iter().map(|info| info.fetched_at).max(),
            earliest_expire_time: live.iter().map(|info| info.expires_at).min(),
        }
    }

    /// Count and total size of all entry files
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the cache directory exists but cannot be listed.
    pub fn size(&self) -> Result<CacheSize> {
        let files = self.entry_files()?;
        Ok(CacheSize {
            file_count: files.len(),
            total_bytes: files.iter().map(|(_, len)| len).sum(),
        })
    }

    /// Whether any entry file exists, regardless of age
    #[must_use]
    pub fn has_any(&self) -> bool {
        self.size().is_ok_and(|size| size.file_count > 0)
    }

    /// Modification time of a live entry; evicts expired entries
    fn live_mtime(&self, path: &Path, ttl: Duration) -> Option<SystemTime> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to stat cache entry");
                return None;
            }
        };

        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cache entry has no modification time");
                return None;
            }
        };

        // A timestamp in the future counts as brand new
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);

        if age >= ttl {
            debug!(path = %path.display(), age_secs = age.as_secs(), "Cache entry expired");
            evict(path);
            return None;
        }
        Some(modified)
    }

    fn entry_files(&self) -> Result<Vec<(PathBuf, u64)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(e, &self.dir, "read_dir")),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(e, &self.dir, "read_dir"))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            match entry.metadata() {
                Ok(metadata) if metadata.is_file() => files.push((path, metadata.len())),
                _ => {}
            }
        }
        Ok(files)
    }
}

fn encode(key: &CacheKey, dataset: &Dataset) -> Result<Vec<u8>> {
    serde_json::to_vec(dataset).map_err(|source| Error::Encode {
        key: key.to_string(),
        rows: dataset.len(),
        source,
    })
}

fn report_write(key: &CacheKey, rows: usize, written: Result<()>) -> bool {
    match written {
        Ok(()) => {
            debug!(key = %key, rows, "Cache entry written");
            true
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to write cache entry");
            false
        }
    }
}

fn evict(path: &Path) {
    if let Err(e) = fs::remove_file(path)
        && e.kind() != ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "Failed to remove cache entry");
    }
}
