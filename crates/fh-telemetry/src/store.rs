//! Best-effort persistence of ERROR and CRITICAL events.
//!
//! Each critical event is written under its own key so a crash between
//! writes loses at most one event. Older keys are pruned beyond a fixed cap.
//! Callers treat every failure here as non-fatal.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fh_common::TelemetryEvent;
use thiserror::Error;
use tracing::{debug, warn};

/// Key prefix of persisted critical events.
pub const STORE_KEY_PREFIX: &str = "fh_error_";

/// Default number of persisted events kept.
pub const DEFAULT_MAX_PERSISTED: usize = 50;

/// Errors from critical-event storage.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Storage for critical events.
pub trait CriticalEventStore: Send + Sync {
    /// Persist one event under its own key.
    fn persist(&self, event: &TelemetryEvent) -> Result<(), StoreError>;

    /// Drop the oldest entries beyond `keep`; returns how many were removed.
    fn prune(&self, keep: usize) -> Result<usize, StoreError>;

    /// Stored events, newest first.
    fn load_all(&self) -> Result<Vec<TelemetryEvent>, StoreError>;
}

/// Storage key for an event: `fh_error_<timestamp>_<id>`.
pub fn store_key(event: &TelemetryEvent) -> String {
    format!("{}{}_{}", STORE_KEY_PREFIX, event.timestamp, event.id)
}

/// Timestamp embedded in a storage key, used for ordering.
fn key_timestamp(key: &str) -> Option<i64> {
    key.strip_prefix(STORE_KEY_PREFIX)?
        .split('_')
        .next()?
        .parse()
        .ok()
}

/// One JSON file per event in a directory.
#[derive(Debug, Clone)]
pub struct FileEventStore {
    dir: PathBuf,
}

impl FileEventStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Stored file paths, newest first.
    ///
    /// Keys sharing a millisecond are ordered by modification time.
    fn list_keys(&self) -> Result<Vec<(i64, String, PathBuf)>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if let Some(ts) = key_timestamp(&key) {
                let modified = entry.metadata().and_then(|m| m.modified()).ok();
                keys.push((ts, modified, key, path));
            }
        }
        keys.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| b.1.cmp(&a.1))
                .then_with(|| b.2.cmp(&a.2))
        });
        Ok(keys
            .into_iter()
            .map(|(ts, _, key, path)| (ts, key, path))
            .collect())
    }
}

impl CriticalEventStore for FileEventStore {
    fn persist(&self, event: &TelemetryEvent) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let key = store_key(event);
        let path = self.file_path(&key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(event)?)?;
        fs::rename(&tmp, &path)?;
        debug!(key = %key, "persisted critical event");
        Ok(())
    }

    fn prune(&self, keep: usize) -> Result<usize, StoreError> {
        let keys = self.list_keys()?;
        let mut removed = 0;
        for (_, key, path) in keys.into_iter().skip(keep) {
            match fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    debug!(key = %key, "pruned persisted critical event");
                }
                Err(e) => warn!(key = %key, error = %e, "failed to prune persisted event"),
            }
        }
        Ok(removed)
    }

    fn load_all(&self) -> Result<Vec<TelemetryEvent>, StoreError> {
        let mut events = Vec::new();
        for (_, key, path) in self.list_keys()? {
            let parsed = fs::read(&path)
                .map_err(StoreError::from)
                .and_then(|bytes| serde_json::from_slice(&bytes).map_err(StoreError::from));
            match parsed {
                Ok(event) => events.push(event),
                Err(e) => warn!(key = %key, error = %e, "skipping unreadable persisted event"),
            }
        }
        Ok(events)
    }
}

/// In-memory store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    entries: Mutex<Vec<(String, TelemetryEvent)>>,
    /// When set, every write fails with this message.
    fail_writes: Option<String>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail, simulating an exhausted quota.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            fail_writes: Some(reason.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, TelemetryEvent)>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl CriticalEventStore for MemoryEventStore {
    fn persist(&self, event: &TelemetryEvent) -> Result<(), StoreError> {
        if let Some(reason) = &self.fail_writes {
            return Err(StoreError::Unavailable(reason.clone()));
        }
        let mut entries = self.lock();
        // Newest first, matching load order of the file store.
        entries.insert(0, (store_key(event), event.clone()));
        Ok(())
    }

    fn prune(&self, keep: usize) -> Result<usize, StoreError> {
        let mut entries = self.lock();
        let before = entries.len();
        entries.truncate(keep);
        Ok(before - entries.len())
    }

    fn load_all(&self) -> Result<Vec<TelemetryEvent>, StoreError> {
        Ok(self.lock().iter().map(|(_, e)| e.clone()).collect())
    }
}
