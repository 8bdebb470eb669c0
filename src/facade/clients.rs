// ./src/facade/clients.rs

use tracing::{debug, info, warn};

use super::legacy::{scan_legacy, CLIENT_COMPAT_WRITE_KEYS, CLIENT_LEGACY_SOURCES};
use crate::engine::PermanentStorage;
use crate::error::{Result, StorageError};
use crate::types::{ClientsState, Namespace};

/// Clients facade over the permanent storage engine.
#[derive(Clone)]
pub struct ClientStore {
    pub(crate) engine: PermanentStorage,
}

impl ClientStore {
    pub fn new(engine: PermanentStorage) -> Self {
        Self { engine }
    }

    /// Current clients, migrating from a legacy key when the engine has none.
    ///
    /// Total absence is not an error: an empty, fully-shaped state comes back.
    /// Stored JSON that is not a clients document is an error, so that CRUD
    /// callers never save over it.
    pub async fn get_clients_data(&self) -> Result<ClientsState> {
        let stored = self.engine.try_load_data::<ClientsState>(Namespace::Clients).await?;
        if let Some(state) = &stored {
            if !state.is_empty() {
                return Ok(state.clone());
            }
        }

        let legacy = scan_legacy(
            self.engine.local(),
            &CLIENT_LEGACY_SOURCES,
            ClientsState::has_data,
        );
        if let Some(hit) = legacy {
            info!(key = hit.key, clients = hit.value.len(), "migrating clients from legacy key");
            if !self.engine.save_data(Namespace::Clients, &hit.value).await {
                warn!(key = hit.key, "legacy clients could not be migrated, serving them anyway");
            }
            return Ok(hit.value);
        }

        debug!("no clients stored");
        Ok(stored.unwrap_or_default())
    }

    /// Persist the whole clients document.
    ///
    /// Succeeds when either the compatibility keys or the engine accepted it.
    pub async fn save_clients_data(&self, clients: &ClientsState) -> Result<()> {
        let local = self.engine.local();
        let mut legacy_ok = false;
        for key in CLIENT_COMPAT_WRITE_KEYS {
            legacy_ok |= local.save(key, clients);
        }

        let engine_ok = self.engine.save_data(Namespace::Clients, clients).await;
        if !engine_ok {
            warn!(legacy_ok, "engine rejected clients save");
        }

        if legacy_ok || engine_ok {
            Ok(())
        } else {
            Err(StorageError::WriteFailed(Namespace::Clients))
        }
    }

    /// Whether any client exists in the engine or any legacy source.
    pub async fn has_clients(&self) -> bool {
        let stored = self.engine.load_data::<ClientsState>(Namespace::Clients).await;
        if stored.is_some_and(|state| !state.is_empty()) {
            return true;
        }
        scan_legacy(
            self.engine.local(),
            &CLIENT_LEGACY_SOURCES,
            ClientsState::has_data,
        )
        .is_some()
    }
}
