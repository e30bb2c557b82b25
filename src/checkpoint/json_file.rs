// SPDX-License-Identifier: Apache-2.0

//! JSON file-based checkpoint storage with atomic writes.
//!
//! The whole database is a single JSON document of `scope -> key -> value`.
//! Writes replace the document via write-to-temp-then-rename.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checkpoint::schema::{OFFSETS_SCOPE, PersistedOffsetV1};
use crate::checkpoint::store::PositionStore;
use crate::error::{Error, Result};
use crate::source::record::{Checkpoint, Position, SourcePartition};

#[derive(Debug, Default, Serialize, Deserialize)]
struct DatabaseState {
    scopes: HashMap<String, HashMap<String, serde_json::Value>>,
}

/// A shared JSON file database handle
#[derive(Clone)]
pub struct JsonFileDatabase {
    path: PathBuf,
    state: Arc<RwLock<DatabaseState>>,
}

impl JsonFileDatabase {
    /// Open or create a database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = if path.exists() {
            let file = File::open(&path)
                .map_err(|e| Error::Persistence(format!("failed to open database: {}", e)))?;
            serde_json::from_reader(BufReader::new(file))
                .map_err(|e| Error::Persistence(format!("failed to parse database: {}", e)))?
        } else {
            DatabaseState::default()
        };

        debug!(path = ?path, "Opened checkpoint database");

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Create an in-memory database (useful for testing)
    pub fn open_memory() -> Self {
        Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(DatabaseState::default())),
        }
    }

    /// Whether this database is backed by a file
    pub fn is_persistent(&self) -> bool {
        !self.path.as_os_str().is_empty()
    }

    /// Create a persister for the given scope
    pub fn persister(&self, scope: impl Into<String>) -> JsonFilePersister {
        JsonFilePersister {
            db: self.clone(),
            scope: scope.into(),
            cache: HashMap::new(),
        }
    }

    /// Create a persister for file source checkpoints
    pub fn offsets_persister(&self) -> JsonFilePersister {
        self.persister(OFFSETS_SCOPE)
    }

    fn read_value(&self, scope: &str, key: &str) -> Result<Option<serde_json::Value>> {
        let state = self
            .state
            .read()
            .map_err(|e| Error::Persistence(e.to_string()))?;

        Ok(state
            .scopes
            .get(scope)
            .and_then(|data| data.get(key))
            .cloned())
    }

    fn write_to_disk(&self) -> Result<()> {
        if !self.is_persistent() {
            return Ok(());
        }

        let state = self
            .state
            .read()
            .map_err(|e| Error::Persistence(e.to_string()))?;

        atomic_write(&self.path, &state)
    }
}

impl PositionStore for JsonFileDatabase {
    fn get_checkpoint(&self, partition: &SourcePartition) -> Result<Option<Position>> {
        match self.read_value(OFFSETS_SCOPE, partition.key())? {
            None => Ok(None),
            Some(value) => {
                let entry: PersistedOffsetV1 = serde_json::from_value(value).map_err(|e| {
                    Error::Persistence(format!(
                        "malformed checkpoint for {}: {}",
                        partition.key(),
                        e
                    ))
                })?;
                Ok(Some(entry.position))
            }
        }
    }
}

/// A writable view of one scope of a [`JsonFileDatabase`].
///
/// Values are staged in a local cache and become visible to other handles
/// and durable on disk only after [`JsonFilePersister::sync`].
pub struct JsonFilePersister {
    db: JsonFileDatabase,
    scope: String,
    cache: HashMap<String, serde_json::Value>,
}

impl JsonFilePersister {
    /// Stage a value under the given key
    pub fn set_raw_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| Error::Persistence(format!("failed to serialize to JSON: {}", e)))?;
        self.cache.insert(key.to_string(), json_value);
        Ok(())
    }

    /// Get a staged value, reporting values that fail to decode as `T`
    pub fn try_get_raw_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> std::result::Result<Option<T>, serde_json::Error> {
        match self.cache.get(key) {
            None => Ok(None),
            Some(v) => serde_json::from_value(v.clone()).map(Some),
        }
    }

    /// Keys currently staged in this scope
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cache.keys().map(String::as_str)
    }

    /// Stage a checkpoint for its partition
    pub fn set_checkpoint(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        self.set_raw_json(
            checkpoint.partition.key(),
            &PersistedOffsetV1::from(checkpoint),
        )
    }

    /// Replace the cache with what the database currently holds for this scope
    pub fn load(&mut self) -> Result<()> {
        let state = self
            .db
            .state
            .read()
            .map_err(|e| Error::Persistence(e.to_string()))?;

        self.cache = state.scopes.get(&self.scope).cloned().unwrap_or_default();
        Ok(())
    }

    /// Publish the cache to the shared state and write it to disk
    pub fn sync(&self) -> Result<()> {
        {
            let mut state = self
                .db
                .state
                .write()
                .map_err(|e| Error::Persistence(e.to_string()))?;

            state.scopes.insert(self.scope.clone(), self.cache.clone());
        }

        self.db.write_to_disk()
    }
}

/// Write state to file atomically (write to temp, then rename)
fn atomic_write(path: &Path, state: &DatabaseState) -> Result<()> {
    use portable_atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            Error::Persistence(format!("failed to create parent directory: {}", e))
        })?;
    }

    // pid + counter keeps concurrent writers off each other's temp files
    let unique_id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let temp_path = path.with_extension(format!("tmp.{}.{}", std::process::id(), unique_id));

    let file = File::create(&temp_path)
        .map_err(|e| Error::Persistence(format!("failed to create temp file: {}", e)))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, state)
        .map_err(|e| Error::Persistence(format!("failed to write database: {}", e)))?;
    writer
        .flush()
        .map_err(|e| Error::Persistence(format!("failed to flush database: {}", e)))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| Error::Persistence(format!("failed to sync database: {}", e)))?;
    drop(writer);

    fs::rename(&temp_path, path)
        .map_err(|e| Error::Persistence(format!("failed to rename database file: {}", e)))?;

    Ok(())
}
