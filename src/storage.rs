//! Durable key-value storage behind the annotation store.
//!
//! One key per state slice, values are JSON text. `SledStorage` keeps the
//! slices on disk; `MemoryStorage` is the in-process stand-in used by tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::StorageError;

pub const FAVORITES_KEY: &str = "vademecum_favorites";
pub const ANNOTATIONS_KEY: &str = "vademecum_annotations";
pub const HIGHLIGHTS_KEY: &str = "vademecum_highlights";
pub const IMAGES_KEY: &str = "vademecum_images";
pub const AUDIOS_KEY: &str = "vademecum_audios";
pub const EXPLANATIONS_KEY: &str = "vademecum_explanations";

/// Flat string-keyed get/set surface.
pub trait KeyValueStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

// ============================================================================
// Sled Backend
// ============================================================================

#[derive(Clone)]
pub struct SledStorage {
    db: sled::Db,
}

impl SledStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// A database that lives only as long as this handle.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }
}

impl KeyValueStorage for SledStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.db.get(key.as_bytes())? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| StorageError::Encoding(key.to_string())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.db.insert(key.as_bytes(), value.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }
}

// ============================================================================
// In-Memory Backend
// ============================================================================

/// Clones share the same map, so a second store opened on a clone sees what
/// the first one persisted.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_clones_share_entries() {
        let a = MemoryStorage::new();
        let b = a.clone();
        a.set(FAVORITES_KEY, "[\"5\"]").unwrap();
        assert_eq!(b.get(FAVORITES_KEY).unwrap().as_deref(), Some("[\"5\"]"));
        assert_eq!(b.get(ANNOTATIONS_KEY).unwrap(), None);
    }

    #[test]
    fn test_sled_storage_roundtrip() {
        let storage = SledStorage::temporary().unwrap();
        assert_eq!(storage.get(HIGHLIGHTS_KEY).unwrap(), None);
        storage.set(HIGHLIGHTS_KEY, "{}").unwrap();
        storage.set(HIGHLIGHTS_KEY, "{\"1\":[]}").unwrap();
        assert_eq!(storage.get(HIGHLIGHTS_KEY).unwrap().as_deref(), Some("{\"1\":[]}"));
    }
}
