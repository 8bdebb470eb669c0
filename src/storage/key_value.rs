// ./src/storage/key_value.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::KeyValueStore;
use crate::error::StorageError;

/// In-memory key-value store. Used as the session tier and in tests.
///
/// An optional byte quota (sum of key and value lengths) makes writes fail
/// the way a full browser store does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<BTreeMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: Mutex::new(BTreeMap::new()),
            quota: Some(quota_bytes),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
        if let Some(quota) = self.quota {
            let used: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
        items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(items.keys().cloned().collect())
    }
}

/// Durable key-value store kept as a single JSON document on disk.
///
/// Every mutation rewrites the document through a temp file and rename, so
/// a crash mid-write leaves the previous document intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        // Create storage directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let items = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
                Ok(items) => items,
                Err(e) => {
                    let aside = path.with_extension("json.corrupt");
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "key-value document unreadable, moving it aside and starting empty"
                    );
                    fs::rename(&path, &aside)?;
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let contents = serde_json::to_string(items)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
        let previous = items.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&items) {
            match previous {
                Some(old) => items.insert(key.to_string(), old),
                None => items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
        let Some(previous) = items.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.persist(&items) {
            items.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(items.keys().cloned().collect())
    }
}

/// Never-failing wrapper over a [`KeyValueStore`].
///
/// Errors are logged here and come back as `None`/`false`. Retrying and
/// falling back to other tiers is the engine's job.
#[derive(Clone)]
pub struct KeyValueAdapter {
    store: Arc<dyn KeyValueStore>,
}

impl KeyValueAdapter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read and JSON-decode `key`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "stored value is not valid JSON for the requested type");
                None
            }
        }
    }

    /// JSON-encode `value` and write it under `key`.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_raw(key, &raw),
            Err(e) => {
                warn!(key, error = %e, "failed to encode value");
                false
            }
        }
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        match self.store.get_item(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "key-value read failed");
                None
            }
        }
    }

    pub fn set_raw(&self, key: &str, raw: &str) -> bool {
        match self.store.set_item(key, raw) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "key-value write failed");
                false
            }
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        match self.store.remove_item(key) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "key-value delete failed");
                false
            }
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.store.keys().unwrap_or_else(|e| {
            debug!(error = %e, "key listing failed");
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_store_quota() {
        let store = MemoryStore::with_quota(16);
        store.set_item("a", "12345").unwrap();
        assert_eq!(
            store.set_item("b", "1234567890123"),
            Err(StorageError::QuotaExceeded {
                key: "b".to_string()
            })
        );
        // Replacing an existing key only counts the new value.
        store.set_item("a", "123456789").unwrap();
        assert_eq!(store.get_item("a").unwrap().as_deref(), Some("123456789"));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("local-storage.json");

        let store = FileStore::open(&path).unwrap();
        store.set_item("mok-mzansi-books-company", "{\"name\":\"Mok\"}").unwrap();
        store.set_item("scratch", "1").unwrap();
        store.remove_item("scratch").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get_item("mok-mzansi-books-company").unwrap().as_deref(),
            Some("{\"name\":\"Mok\"}")
        );
        assert_eq!(reopened.keys().unwrap(), vec!["mok-mzansi-books-company"]);
    }

    #[test]
    fn test_file_store_moves_corrupt_document_aside() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("local-storage.json");
        fs::write(&path, "{{{ not json").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(store.keys().unwrap().is_empty());
        assert!(tmp.path().join("local-storage.json.corrupt").exists());
    }

    #[test]
    fn test_adapter_swallows_failures() {
        let adapter = KeyValueAdapter::new(Arc::new(MemoryStore::with_quota(8)));
        assert!(!adapter.save("too-long-key", &json!({"a": 1})));
        assert_eq!(adapter.load::<serde_json::Value>("too-long-key"), None);
    }

    #[test]
    fn test_adapter_load_rejects_bad_json() {
        let store = Arc::new(MemoryStore::new());
        store.set_item("k", "{broken").unwrap();
        let adapter = KeyValueAdapter::new(store);
        assert_eq!(adapter.load::<serde_json::Value>("k"), None);
        assert_eq!(adapter.get_raw("k").as_deref(), Some("{broken"));
    }
}
