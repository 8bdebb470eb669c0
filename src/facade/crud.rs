//! Entity CRUD over whole-document read-modify-write.
//!
//! Each call loads the full namespace document, mutates it in memory and
//! saves it back. There is no locking: two overlapping calls on the same
//! namespace can lose an update.

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::legacy::COMPANY_LEGACY_SOURCES;
use super::{ClientStore, CompanyStore};
use crate::error::{Result, StorageError};
use crate::types::{Client, ClientCategory, CompanyDetails, Namespace};

impl ClientStore {
    /// Append `client` to `category`. An empty `id` is replaced by a fresh
    /// UUID; the stored client is returned.
    pub async fn add_client(&self, mut client: Client, category: ClientCategory) -> Result<Client> {
        let mut clients = self.get_clients_data().await?;
        if client.id.trim().is_empty() {
            client.id = uuid::Uuid::new_v4().to_string();
        }
        clients.category_mut(category).push(client.clone());
        self.save_clients_data(&clients).await?;
        info!(id = %client.id, category = %category, "client added");
        Ok(client)
    }

    /// Replace the client with the same `id` in `category`. No match is a no-op.
    pub async fn update_client(&self, client: Client, category: ClientCategory) -> Result<()> {
        let mut clients = self.get_clients_data().await?;
        let entries = clients.category_mut(category);
        match entries.iter_mut().find(|existing| existing.id == client.id) {
            Some(existing) => *existing = client,
            None => debug!(id = %client.id, category = %category, "update matched no client"),
        }
        self.save_clients_data(&clients).await
    }

    pub async fn delete_client(&self, id: &str, category: ClientCategory) -> Result<()> {
        let mut clients = self.get_clients_data().await?;
        clients.category_mut(category).retain(|existing| existing.id != id);
        self.save_clients_data(&clients).await
    }
}

impl CompanyStore {
    /// Merge `patch` into the stored record field by field and save it.
    pub async fn update_company_details(
        &self,
        patch: Map<String, Value>,
    ) -> Result<CompanyDetails> {
        let current = self.get_company_details().await?;
        let mut fields = match serde_json::to_value(&current)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        fields.extend(patch);

        let updated: CompanyDetails = serde_json::from_value(Value::Object(fields))?;
        self.save_company_details(&updated).await?;
        Ok(updated)
    }

    /// Wipe every tier and legacy key holding the company record.
    pub async fn clear_company_details(&self) -> Result<()> {
        let mut all_ok = self.engine.clear_data(Namespace::Company).await;
        for key in COMPANY_LEGACY_SOURCES.keys() {
            all_ok &= self.engine.local().remove(key);
        }
        if all_ok {
            Ok(())
        } else {
            Err(StorageError::WriteFailed(Namespace::Company))
        }
    }
}
