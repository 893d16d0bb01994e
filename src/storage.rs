//! Durable string key-value store backed by a single JSON file
//!
//! The whole mapping is loaded when the store is opened and the whole file is
//! rewritten on every [`KeyValueStore::set`]. Reads never touch the disk.
//!
//! Opening never fails. A missing file is an empty store; an unreadable or
//! malformed file is also an empty store, reported with a warning because the
//! previous contents are lost on the next write.
//!
//! The file is single-writer: two stores on the same path race, and the last
//! completed `set` wins.

use crate::storage_span;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// File used when no path is configured
pub const DEFAULT_STORAGE_FILE: &str = ".storage.json";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode store contents: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Flat string-to-string mapping persisted to one file
#[derive(Debug)]
pub struct KeyValueStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl KeyValueStore {
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_STORAGE_FILE)
    }

    /// Open the store at `path`, loading whatever valid mapping it holds
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let _span = storage_span!("open", path = %path.display()).entered();
        let entries = load_entries(&path);
        Self { path, entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Update one entry and rewrite the backing file with the full mapping
    ///
    /// The in-memory value is updated even if the write fails.
    pub fn set<K, V>(&mut self, key: K, value: V) -> Result<(), StorageError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let key = key.into();
        let _span = storage_span!("set", path = %self.path.display(), key = %key).entered();
        self.entries.insert(key, value.into());

        let contents = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, contents).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })?;

        debug!(entries = self.entries.len(), "Persisted store");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_entries(path: &Path) -> BTreeMap<String, String> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No store file yet, starting empty");
            return BTreeMap::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store file unreadable, starting empty");
            return BTreeMap::new();
        }
    };

    match serde_json::from_str(&contents) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store file is corrupt, starting empty");
            BTreeMap::new()
        }
    }
}
