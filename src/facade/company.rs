// ./src/facade/company.rs

use tracing::{debug, info, warn};

use super::legacy::{scan_legacy, COMPANY_COMPAT_WRITE_KEYS, COMPANY_LEGACY_SOURCES};
use crate::engine::PermanentStorage;
use crate::error::{Result, StorageError};
use crate::types::{CompanyDetails, Namespace};

/// Company profile facade. Mirrors [`super::ClientStore`] for a single
/// flat record; a non-empty `name` marks the record as present.
#[derive(Clone)]
pub struct CompanyStore {
    pub(crate) engine: PermanentStorage,
}

impl CompanyStore {
    pub fn new(engine: PermanentStorage) -> Self {
        Self { engine }
    }

    pub async fn get_company_details(&self) -> Result<CompanyDetails> {
        let stored = self.engine.try_load_data::<CompanyDetails>(Namespace::Company).await?;
        if let Some(details) = &stored {
            if details.has_data() {
                return Ok(details.clone());
            }
        }

        let legacy = scan_legacy(
            self.engine.local(),
            &COMPANY_LEGACY_SOURCES,
            CompanyDetails::has_data,
        );
        if let Some(hit) = legacy {
            info!(key = hit.key, "migrating company details from legacy key");
            if !self.engine.save_data(Namespace::Company, &hit.value).await {
                warn!(key = hit.key, "legacy company details could not be migrated");
            }
            return Ok(hit.value);
        }

        debug!("no company details stored");
        Ok(stored.unwrap_or_default())
    }

    pub async fn save_company_details(&self, details: &CompanyDetails) -> Result<()> {
        let local = self.engine.local();
        let mut legacy_ok = false;
        for key in COMPANY_COMPAT_WRITE_KEYS {
            legacy_ok |= local.save(key, details);
        }

        let engine_ok = self.engine.save_data(Namespace::Company, details).await;
        if legacy_ok || engine_ok {
            Ok(())
        } else {
            Err(StorageError::WriteFailed(Namespace::Company))
        }
    }

    pub async fn has_company_details(&self) -> bool {
        let stored = self.engine.load_data::<CompanyDetails>(Namespace::Company).await;
        if stored.is_some_and(|details| details.has_data()) {
            return true;
        }
        scan_legacy(
            self.engine.local(),
            &COMPANY_LEGACY_SOURCES,
            CompanyDetails::has_data,
        )
        .is_some()
    }
}
