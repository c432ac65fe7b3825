//! Snapshot Store Module
//!
//! Loads the snapshot file into a cache state and rewrites it atomically:
//! the full state goes to a temporary file next to the target, which is then
//! renamed over it. A crash before the rename leaves the old snapshot intact.

use std::fs;
use std::hash::Hash;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheState};
use crate::config::validate_filename;
use crate::error::{CacheError, Result};
use crate::snapshot::DirResolver;

// == Wire Format ==
// Entries are stored as a list of pairs so structured keys survive JSON.
#[derive(Serialize)]
struct SnapshotRef<'a, K, V> {
    entries: Vec<(&'a K, &'a CacheEntry<V>)>,
}

#[derive(Deserialize)]
struct Snapshot<K, V> {
    entries: Vec<(K, CacheEntry<V>)>,
}

// == Snapshot Store ==
/// Reads and atomically replaces one snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    /// Directory holding the snapshot and its temporary files
    dir: PathBuf,
    /// Full snapshot path
    path: PathBuf,
}

impl SnapshotStore {
    // == Constructor ==
    /// Creates a store for `filename` inside the directory given by `resolver`.
    pub fn new(resolver: &dyn DirResolver, filename: &str) -> Result<Self> {
        validate_filename(filename)?;
        let dir = resolver.dir();
        let path = dir.join(filename);
        Ok(Self { dir, path })
    }

    /// Returns the resolved snapshot path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // == Load ==
    /// Reads the snapshot into a cache state.
    ///
    /// A missing file yields an empty state. An unreadable or undecodable
    /// file is an error; nothing is discarded silently.
    pub fn load<K, V>(&self) -> Result<CacheState<K, V>>
    where
        K: Eq + Hash + DeserializeOwned,
        V: DeserializeOwned,
    {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No snapshot found, starting empty");
                return Ok(CacheState::new());
            }
            Err(source) => {
                warn!(path = %self.path.display(), error = %source, "Snapshot is unreadable");
                return Err(CacheError::UnreadableSnapshot {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let snapshot: Snapshot<K, V> = serde_json::from_slice(&bytes).map_err(|source| {
            warn!(path = %self.path.display(), error = %source, "Snapshot is corrupt");
            CacheError::CorruptSnapshot {
                path: self.path.clone(),
                source,
            }
        })?;

        let state: CacheState<K, V> = snapshot.entries.into_iter().collect();
        debug!(path = %self.path.display(), entries = state.len(), "Snapshot loaded");
        Ok(state)
    }

    // == Store ==
    /// Atomically replaces the snapshot with `state`.
    pub fn store<K, V>(&self, state: &CacheState<K, V>) -> Result<()>
    where
        K: Serialize,
        V: Serialize,
    {
        self.stage(state)?.commit()
    }

    // == Stage ==
    /// Writes `state` to a synced temporary file without touching the
    /// snapshot. Dropping the result without committing removes the file.
    pub fn stage<K, V>(&self, state: &CacheState<K, V>) -> Result<StagedSnapshot>
    where
        K: Serialize,
        V: Serialize,
    {
        let encoded = serde_json::to_vec(&SnapshotRef {
            entries: state.iter().collect(),
        })
        .map_err(|e| self.write_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        fs::create_dir_all(&self.dir).map_err(|e| self.write_error(e))?;

        let prefix = format!(".{}.", self.file_name());
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(|e| self.write_error(e))?;

        file.write_all(&encoded).map_err(|e| self.write_error(e))?;
        file.as_file().sync_all().map_err(|e| self.write_error(e))?;

        Ok(StagedSnapshot {
            file,
            target: self.path.clone(),
            entries: state.len(),
        })
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn write_error(&self, source: io::Error) -> CacheError {
        CacheError::PersistenceWrite {
            path: self.path.clone(),
            source,
        }
    }
}

// == Staged Snapshot ==
/// A fully written temporary snapshot waiting to be renamed into place.
#[derive(Debug)]
pub struct StagedSnapshot {
    file: NamedTempFile,
    target: PathBuf,
    entries: usize,
}

impl StagedSnapshot {
    /// Path of the temporary file.
    pub fn temp_path(&self) -> &Path {
        self.file.path()
    }

    /// Renames the temporary file over the snapshot.
    pub fn commit(self) -> Result<()> {
        let StagedSnapshot {
            file,
            target,
            entries,
        } = self;

        file.persist(&target)
            .map_err(|e| CacheError::PersistenceWrite {
                path: target.clone(),
                source: e.error,
            })?;

        debug!(path = %target.display(), entries, "Snapshot persisted");
        Ok(())
    }
}
