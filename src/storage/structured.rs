// ./src/storage/structured.rs
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use sled::Db;
use tracing::{debug, warn};

use super::StructuredStore;
use crate::error::StorageError;
use crate::types::Namespace;

/// Default bound on any single structured-store call.
pub const DEFAULT_STRUCTURED_TIMEOUT: Duration = Duration::from_secs(3);

/// Wrapper around the sled database, one tree per namespace.
#[derive(Clone)]
pub struct SledStructuredStore {
    db: Db,
}

impl SledStructuredStore {
    /// Opens (or creates) the database directory at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// A database that is deleted when dropped.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn has_tree(db: &Db, store: &str) -> bool {
        db.tree_names()
            .iter()
            .any(|name| name.as_ref() == store.as_bytes())
    }
}

#[async_trait::async_trait]
impl StructuredStore for SledStructuredStore {
    async fn initialize(&self, namespaces: &[Namespace]) -> Result<(), StorageError> {
        let db = self.db.clone();
        let stores: Vec<String> = namespaces.iter().map(|ns| ns.keys().store_name).collect();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            for store in stores {
                if !Self::has_tree(&db, &store) {
                    db.open_tree(store.as_bytes())?;
                    debug!(store = %store, "created object store");
                }
            }
            db.flush()?;
            Ok(())
        })
        .await?
    }

    async fn put(&self, store: &str, key: &str, value: String) -> Result<(), StorageError> {
        let db = self.db.clone();
        let store = store.to_string();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let tree = db.open_tree(store.as_bytes())?;
            tree.insert(key.as_bytes(), value.as_bytes())?;
            tree.flush()?;
            Ok(())
        })
        .await?
    }

    async fn get(&self, store: &str, key: &str) -> Result<Option<String>, StorageError> {
        let db = self.db.clone();
        let store = store.to_string();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<String>, StorageError> {
            if !Self::has_tree(&db, &store) {
                return Ok(None);
            }
            let tree = db.open_tree(store.as_bytes())?;
            match tree.get(key.as_bytes())? {
                Some(ivec) => Ok(Some(String::from_utf8(ivec.to_vec())?)),
                None => Ok(None),
            }
        })
        .await?
    }

    async fn delete(&self, store: &str, key: &str) -> Result<(), StorageError> {
        let db = self.db.clone();
        let store = store.to_string();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            if !Self::has_tree(&db, &store) {
                return Ok(());
            }
            let tree = db.open_tree(store.as_bytes())?;
            tree.remove(key.as_bytes())?;
            tree.flush()?;
            Ok(())
        })
        .await?
    }
}

/// Time-bounded, never-failing wrapper over a [`StructuredStore`].
///
/// Callers treat every failure here as non-fatal: errors and timeouts are
/// logged and come back as `false`/`None`.
#[derive(Clone)]
pub struct StructuredStoreAdapter {
    backend: Arc<dyn StructuredStore>,
    timeout: Duration,
}

impl StructuredStoreAdapter {
    pub fn new(backend: Arc<dyn StructuredStore>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    async fn bounded<T, F>(&self, namespace: Namespace, op: &str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.timeout)),
        };
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(namespace = %namespace, op, error = %e, "structured store call failed");
                None
            }
        }
    }

    /// Create the per-namespace object stores.
    pub async fn initialize(&self, namespaces: &[Namespace]) -> bool {
        let result = tokio::time::timeout(self.timeout, self.backend.initialize(namespaces)).await;
        match result {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "structured store initialization failed");
                false
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "structured store initialization timed out");
                false
            }
        }
    }

    /// Upsert the namespace's serialized document.
    pub async fn save(&self, namespace: Namespace, serialized: String) -> bool {
        let keys = namespace.keys();
        self.bounded(
            namespace,
            "save",
            self.backend.put(&keys.store_name, &keys.record_key, serialized),
        )
        .await
        .is_some()
    }

    /// Raw serialized document, if any.
    pub async fn load_raw(&self, namespace: Namespace) -> Option<String> {
        let keys = namespace.keys();
        self.bounded(
            namespace,
            "load",
            self.backend.get(&keys.store_name, &keys.record_key),
        )
        .await
        .flatten()
    }

    /// Decoded document, if present and decodable.
    pub async fn load<T: DeserializeOwned>(&self, namespace: Namespace) -> Option<T> {
        let raw = self.load_raw(namespace).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "structured store holds undecodable JSON");
                None
            }
        }
    }

    pub async fn delete(&self, namespace: Namespace) -> bool {
        let keys = namespace.keys();
        self.bounded(
            namespace,
            "delete",
            self.backend.delete(&keys.store_name, &keys.record_key),
        )
        .await
        .is_some()
    }
}
