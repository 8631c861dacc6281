//! Key-value persistence for sessions and spellbook progress.
//!
//! Values are JSON strings. A value that fails to decode is treated as absent
//! so a corrupt save never prevents a new game from starting.
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Key under which the running level is stored.
pub const SESSION_KEY: &str = "game_session_state";

/// Key under which spellbook progress is stored.
pub const SPELLBOOK_KEY: &str = "spellbook_progress";

/// A string key-value store.
pub trait SessionStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn save(&mut self, key: &str, value: String) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// Serializes `value` as JSON under `key`.
pub fn save_json<S, T>(store: &mut S, key: &str, value: &T) -> Result<(), StorageError>
where
    S: SessionStore + ?Sized,
    T: Serialize,
{
    let json = serde_json::to_string(value)?;
    store.save(key, json)
}

/// Reads and decodes the JSON value under `key`.
///
/// Returns `Ok(None)` when the key is missing or its value cannot be decoded.
pub fn load_json<S, T>(store: &S, key: &str) -> Result<Option<T>, StorageError>
where
    S: SessionStore + ?Sized,
    T: DeserializeOwned,
{
    let Some(raw) = store.load(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("ignoring unreadable value for '{}': {}", key, e);
            Ok(None)
        }
    }
}

/// Keeps everything in memory. Used by tests and throwaway sessions.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Stores all keys in a single JSON object on disk.
///
/// The file is read on every `load` and rewritten on every change. A missing
/// file is an empty store.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| StorageError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!("save file '{}' is corrupt, starting empty: {}", self.path.display(), e);
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, content).map_err(|e| StorageError::Io {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all()?.remove(key))
    }

    fn save(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value);
        self.write_all(&entries)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}
