//! Storage backends and the adapters the engine talks to.
//!
//! Two kinds of backend sit under the engine:
//!
//! - [`KeyValueStore`]: a synchronous string-to-string store with the same
//!   shape as browser `localStorage`/`sessionStorage`. [`FileStore`] is the
//!   durable local tier, [`MemoryStore`] the process-lifetime session tier.
//! - [`StructuredStore`]: an asynchronous object store with one store per
//!   namespace, the IndexedDB equivalent. [`SledStructuredStore`] backs it
//!   with `sled`.
//!
//! Backends report failures as [`StorageError`]. The adapters
//! ([`KeyValueAdapter`], [`StructuredStoreAdapter`]) are the boundary where
//! those errors are logged and turned into `bool`/`Option`, so nothing
//! below the engine ever fails a save or load outright.

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::types::Namespace;

pub mod key_value;
pub mod structured;

pub use key_value::{FileStore, KeyValueAdapter, MemoryStore};
pub use structured::{SledStructuredStore, StructuredStoreAdapter};

/// Synchronous key-value store (localStorage equivalent).
pub trait KeyValueStore: Send + Sync {
    /// Read a key. `Ok(None)` when the key is absent.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a key, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Deleting an absent key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// All keys currently stored, sorted.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Asynchronous object store (IndexedDB equivalent).
#[async_trait::async_trait]
pub trait StructuredStore: Send + Sync {
    /// Create one object store per namespace if missing.
    async fn initialize(&self, namespaces: &[Namespace]) -> Result<(), StorageError>;

    /// Upsert `value` under `key` in object store `store`.
    async fn put(&self, store: &str, key: &str, value: String) -> Result<(), StorageError>;

    /// Fetch `key` from `store`. `Ok(None)` if the store or key does not exist.
    async fn get(&self, store: &str, key: &str) -> Result<Option<String>, StorageError>;

    /// Remove `key` from `store`.
    async fn delete(&self, store: &str, key: &str) -> Result<(), StorageError>;
}

/// The concrete backends one engine instance runs on.
#[derive(Clone)]
pub struct StorageBackends {
    pub local: Arc<dyn KeyValueStore>,
    pub session: Arc<dyn KeyValueStore>,
    pub structured: Option<Arc<dyn StructuredStore>>,
}

impl StorageBackends {
    /// Backends that live only in memory. Structured tier is absent.
    pub fn in_memory() -> Self {
        Self {
            local: Arc::new(MemoryStore::new()),
            session: Arc::new(MemoryStore::new()),
            structured: None,
        }
    }

    /// Open the on-disk backends under `config.data_dir`.
    ///
    /// A structured store that fails to open is dropped with a warning;
    /// the engine then runs on the key-value tiers alone.
    pub fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        let data_dir = Path::new(&config.data_dir);
        std::fs::create_dir_all(data_dir)?;

        let local = FileStore::open(data_dir.join("local-storage.json"))?;
        let structured: Option<Arc<dyn StructuredStore>> =
            match SledStructuredStore::open(data_dir.join("structured")) {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    warn!(error = %e, "structured store unavailable, continuing without it");
                    None
                }
            };

        Ok(Self {
            local: Arc::new(local),
            session: Arc::new(MemoryStore::new()),
            structured,
        })
    }
}
