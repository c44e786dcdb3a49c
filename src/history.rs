//! Persistent record of stories already distributed.
//!
//! The store is a JSON array of identity keys, oldest first. During a run it
//! only grows; on save it is cut back to the most recent `max_entries` keys.
//!
//! Reading is forgiving: a missing or unreadable file yields an empty store
//! and the run carries on (at worst re-publishing once). Writing is not: a
//! failed save is returned to the caller, since losing history silently
//! defeats deduplication.

use crate::dedup::SeenStore;
use crate::error::PersistenceError;
use crate::models::IdentityKey;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Read-only snapshot of the history taken at run start.
#[derive(Debug, Clone, Default)]
pub struct HistoryView(HashSet<IdentityKey>);

impl SeenStore for HistoryView {
    fn contains(&self, key: &IdentityKey) -> bool {
        self.0.contains(key)
    }

    fn insert(&mut self, key: IdentityKey) -> bool {
        self.0.insert(key)
    }
}

#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    max_entries: usize,
    entries: VecDeque<IdentityKey>,
    index: HashSet<IdentityKey>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            max_entries,
            entries: VecDeque::new(),
            index: HashSet::new(),
        }
    }

    /// Load the store, degrading to an empty history on any failure.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>, max_entries: usize) -> Self {
        let path = path.as_ref();
        let mut store = Self::new(path, max_entries);
        match read_keys(path).await {
            Ok(Some(keys)) => {
                for key in keys {
                    store.record(key);
                }
                info!(entries = store.len(), "Loaded history");
            }
            Ok(None) => info!("No history file yet; starting empty"),
            Err(e) => warn!(error = %e, "History unreadable; treating as empty"),
        }
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.index.contains(key)
    }

    /// Keys oldest first.
    #[cfg(test)]
    pub fn entries(&self) -> impl Iterator<Item = &IdentityKey> {
        self.entries.iter()
    }

    pub fn view(&self) -> HistoryView {
        HistoryView(self.index.clone())
    }

    /// Append `key`. A key already present is left where it is.
    pub fn record(&mut self, key: IdentityKey) -> bool {
        if self.index.contains(&key) {
            return false;
        }
        self.index.insert(key.clone());
        self.entries.push_back(key);
        true
    }

    fn truncate(&mut self) {
        while self.entries.len() > self.max_entries {
            if let Some(oldest) = self.entries.pop_front() {
                debug!(key = %oldest, "Evicting oldest history entry");
                self.index.remove(&oldest);
            }
        }
    }

    /// Truncate to the most recent entries and write the file.
    ///
    /// The file is written to a sibling temp file first and renamed into
    /// place, so a crash mid-write never leaves a half-written history.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn save(&mut self) -> Result<(), PersistenceError> {
        self.truncate();
        let path_str = self.path.display().to_string();
        let json = serde_json::to_string_pretty(&self.entries).map_err(|source| {
            PersistenceError::Json {
                path: path_str.clone(),
                source,
            }
        })?;

        let io_err = |source| PersistenceError::Io {
            path: path_str.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await.map_err(io_err)?;
        fs::rename(&tmp, &self.path).await.map_err(io_err)?;

        info!(entries = self.entries.len(), "Saved history");
        Ok(())
    }
}

impl SeenStore for HistoryStore {
    fn contains(&self, key: &IdentityKey) -> bool {
        HistoryStore::contains(self, key)
    }

    fn insert(&mut self, key: IdentityKey) -> bool {
        self.record(key)
    }
}

async fn read_keys(path: &Path) -> Result<Option<Vec<IdentityKey>>, PersistenceError> {
    let path_str = path.display().to_string();
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistenceError::Io {
                path: path_str,
                source,
            })
        }
    };
    let keys = serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Json {
        path: path_str,
        source,
    })?;
    Ok(Some(keys))
}
