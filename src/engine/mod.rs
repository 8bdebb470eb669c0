//! Permanent storage engine
//!
//! Fans every save out to all enabled tiers of a namespace and fans loads in
//! through a fixed fallback chain:
//!
//! ```text
//! primary -> backup-1 -> backup-2 -> persistent -> secure -> session -> structured
//! ```
//!
//! The first tier holding a decodable, non-null document wins. A hit past
//! the primary tier is written back through the full fan-out so every tier
//! re-converges. Saves report success when the primary key-value write
//! succeeded; the structured-store write and the post-save validation run
//! as detached background tasks (see [`PermanentStorage::settle`]).
//!
//! The engine is a cheap `Clone` handle. Construct one per process and pass
//! it to the facades explicitly.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::StorageOptions;
use crate::error::{Result, StorageError};
use crate::storage::{KeyValueAdapter, StorageBackends, StructuredStore, StructuredStoreAdapter};
use crate::types::{Namespace, Tier};

pub mod codec;
pub mod recovery;
pub mod report;

pub use recovery::ValidationReport;
pub use report::{ImportSummary, NamespaceReport, Snapshot, TierReport};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

struct EngineState {
    local: KeyValueAdapter,
    session: KeyValueAdapter,
    structured_backend: Option<Arc<dyn StructuredStore>>,
    options: RwLock<StorageOptions>,
    init: OnceCell<()>,
    ready: AtomicBool,
    /// Set when the structured store failed to initialize.
    structured_degraded: AtomicBool,
    corruption_counts: Mutex<HashMap<Namespace, u32>>,
    last_restore: Mutex<HashMap<Namespace, Instant>>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

/// Shared handle to the redundancy engine.
#[derive(Clone)]
pub struct PermanentStorage {
    inner: Arc<EngineState>,
}

impl PermanentStorage {
    pub fn new(backends: StorageBackends) -> Self {
        Self {
            inner: Arc::new(EngineState {
                local: KeyValueAdapter::new(backends.local),
                session: KeyValueAdapter::new(backends.session),
                structured_backend: backends.structured,
                options: RwLock::new(StorageOptions::default()),
                init: OnceCell::new(),
                ready: AtomicBool::new(false),
                structured_degraded: AtomicBool::new(false),
                corruption_counts: Mutex::new(HashMap::new()),
                last_restore: Mutex::new(HashMap::new()),
                background: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Direct access to the durable key-value tier, used by the facades for
    /// legacy keys.
    pub fn local(&self) -> &KeyValueAdapter {
        &self.inner.local
    }

    pub fn session(&self) -> &KeyValueAdapter {
        &self.inner.session
    }

    pub fn options(&self) -> StorageOptions {
        self.inner
            .options
            .read()
            .map(|options| options.clone())
            .unwrap_or_default()
    }

    /// Apply options and prepare the structured store. Runs once; later
    /// calls (including their options) are no-ops.
    pub async fn initialize(&self, options: Option<StorageOptions>) -> bool {
        let mut pending = options;
        self.inner
            .init
            .get_or_init(|| self.run_initialization(pending.take()))
            .await;
        if pending.is_some() {
            debug!("storage already initialized, ignoring new options");
        }
        self.is_ready()
    }

    async fn run_initialization(&self, options: Option<StorageOptions>) {
        if let Some(options) = options {
            if let Ok(mut current) = self.inner.options.write() {
                *current = options;
            }
        }

        let options = self.options();
        if options.use_structured_store {
            match &self.inner.structured_backend {
                None => {
                    info!("no structured store in this runtime, tier disabled");
                    self.inner.structured_degraded.store(true, Ordering::SeqCst);
                }
                Some(backend) => {
                    let adapter = StructuredStoreAdapter::new(
                        backend.clone(),
                        options.structured_store_timeout(),
                    );
                    if !adapter.initialize(&Namespace::ALL).await {
                        warn!("structured store failed to initialize, tier disabled");
                        self.inner.structured_degraded.store(true, Ordering::SeqCst);
                    }
                }
            }
        }

        self.inner.ready.store(true, Ordering::SeqCst);
        info!(
            structured = self.structured().is_some(),
            session = options.use_session_storage,
            secure = options.use_secure_backup,
            "permanent storage ready"
        );
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    /// Poll readiness until `timeout` elapses.
    pub async fn wait_until_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_ready() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(READY_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    pub(crate) fn structured(&self) -> Option<StructuredStoreAdapter> {
        let options = self.options();
        if !options.use_structured_store || self.inner.structured_degraded.load(Ordering::SeqCst) {
            return None;
        }
        let backend = self.inner.structured_backend.clone()?;
        Some(StructuredStoreAdapter::new(
            backend,
            options.structured_store_timeout(),
        ))
    }

    /// Write `value` to every enabled tier of `namespace`.
    ///
    /// Returns `true` when the primary key-value write succeeded.
    pub async fn save_data<T: Serialize + ?Sized>(&self, namespace: Namespace, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.save_raw(namespace, raw).await,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "failed to encode document");
                false
            }
        }
    }

    pub(crate) async fn save_raw(&self, namespace: Namespace, raw: String) -> bool {
        self.initialize(None).await;
        let options = self.options();

        let primary_ok = self.write_key_value_tiers(namespace, &raw);
        if !primary_ok {
            warn!(namespace = %namespace, "primary write failed");
        }

        self.spawn_structured_write(namespace, raw);

        if options.validate_after_save {
            let engine = self.clone();
            let delay = options.validation_delay();
            self.spawn_background(async move {
                tokio::time::sleep(delay).await;
                engine.validate(namespace).await;
            });
        }

        primary_ok
    }

    /// Synchronous fan-out to the key-value tiers. Returns the primary result.
    pub(crate) fn write_key_value_tiers(&self, namespace: Namespace, raw: &str) -> bool {
        let options = self.options();
        let keys = namespace.keys();
        let local = &self.inner.local;

        let primary_ok = local.set_raw(&keys.primary, raw);
        let mut written = usize::from(primary_ok);
        for key in [&keys.backup_1, &keys.backup_2, &keys.persistent] {
            written += usize::from(local.set_raw(key, raw));
        }
        if options.use_secure_backup {
            written += usize::from(local.set_raw(&keys.secure, &codec::encode_secure(raw)));
        }
        if options.use_session_storage {
            written += usize::from(self.inner.session.set_raw(&keys.session, raw));
        }

        debug!(namespace = %namespace, written, "key-value tiers written");
        primary_ok
    }

    /// Detached structured-store write. Failures are logged only.
    pub(crate) fn spawn_structured_write(&self, namespace: Namespace, raw: String) {
        let Some(adapter) = self.structured() else {
            return;
        };
        self.spawn_background(async move {
            if !adapter.save(namespace, raw).await {
                warn!(namespace = %namespace, "background structured store write failed");
            }
        });
    }

    fn spawn_background<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        if let Ok(mut background) = self.inner.background.lock() {
            background.retain(|h| !h.is_finished());
            background.push(handle);
        }
    }

    /// Await every outstanding background task, including tasks spawned
    /// while waiting.
    pub async fn settle(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = match self.inner.background.lock() {
                Ok(mut background) => background.drain(..).collect(),
                Err(_) => return,
            };
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "background storage task failed");
                }
            }
        }
    }

    /// Read `namespace` through the fallback chain.
    pub async fn load_data<T: DeserializeOwned>(&self, namespace: Namespace) -> Option<T> {
        self.try_load_data(namespace).await.ok().flatten()
    }

    /// Like [`load_data`](Self::load_data), but tells absence apart from data
    /// that is valid JSON of the wrong shape.
    ///
    /// `Ok(None)` means no tier held a JSON document. When some tier did but
    /// none decoded as `T`, the error is [`StorageError::Undecodable`] and no
    /// restoration is attempted, so callers can refuse to overwrite it.
    pub async fn try_load_data<T: DeserializeOwned>(
        &self,
        namespace: Namespace,
    ) -> Result<Option<T>> {
        self.initialize(None).await;

        let mut undecodable = None;
        for tier in Tier::LOAD_ORDER {
            let Some(value) = self.read_tier_value(namespace, tier).await else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            match serde_json::from_value::<T>(value.clone()) {
                Ok(data) => {
                    debug!(namespace = %namespace, tier = %tier, "loaded");
                    if tier != Tier::Primary {
                        info!(
                            namespace = %namespace,
                            tier = %tier,
                            "recovered from fallback tier, re-converging"
                        );
                        self.save_raw(namespace, value.to_string()).await;
                    }
                    return Ok(Some(data));
                }
                Err(e) => {
                    warn!(
                        namespace = %namespace,
                        tier = %tier,
                        error = %e,
                        "document does not match expected shape"
                    );
                    undecodable.get_or_insert_with(|| e.to_string());
                }
            }
        }

        if let Some(reason) = undecodable {
            return Err(StorageError::Undecodable { namespace, reason });
        }

        let options = self.options();
        if options.auto_restore && self.claim_restore_slot(namespace, options.restore_cooldown()) {
            info!(namespace = %namespace, "nothing found in any tier, attempting restoration");
            if self.restore(namespace).await {
                return Ok(self.inner.local.load(&namespace.keys().primary));
            }
        }

        debug!(namespace = %namespace, "no data in any tier");
        Ok(None)
    }

    /// True when no load-triggered restoration ran within `cooldown`; marks
    /// the slot as used.
    fn claim_restore_slot(&self, namespace: Namespace, cooldown: Duration) -> bool {
        let Ok(mut last_restore) = self.inner.last_restore.lock() else {
            return false;
        };
        let now = Instant::now();
        match last_restore.get(&namespace) {
            Some(at) if now.duration_since(*at) < cooldown => false,
            _ => {
                last_restore.insert(namespace, now);
                true
            }
        }
    }

    /// Raw (decoded) payload of one tier.
    pub(crate) async fn read_tier_raw(&self, namespace: Namespace, tier: Tier) -> Option<String> {
        let keys = namespace.keys();
        match tier {
            Tier::Primary | Tier::Backup1 | Tier::Backup2 | Tier::Persistent => {
                self.inner.local.get_raw(keys.key_for(tier)?)
            }
            Tier::Secure => {
                let encoded = self.inner.local.get_raw(&keys.secure)?;
                match codec::decode_secure(&encoded) {
                    Ok(raw) => Some(raw),
                    Err(e) => {
                        warn!(namespace = %namespace, error = %e, "secure tier undecodable");
                        None
                    }
                }
            }
            Tier::Session => {
                if !self.options().use_session_storage {
                    return None;
                }
                self.inner.session.get_raw(&keys.session)
            }
            Tier::Structured => self.structured()?.load_raw(namespace).await,
        }
    }

    async fn read_tier_value(&self, namespace: Namespace, tier: Tier) -> Option<Value> {
        let raw = self.read_tier_raw(namespace, tier).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(namespace = %namespace, tier = %tier, error = %e, "tier holds corrupt JSON");
                None
            }
        }
    }

    /// Remove every tier of `namespace`. Returns whether all key-value
    /// deletes succeeded; structured-store failures are logged only.
    pub async fn clear_data(&self, namespace: Namespace) -> bool {
        self.initialize(None).await;
        let keys = namespace.keys();

        let mut all_ok = true;
        for key in keys.local_keys() {
            all_ok &= self.inner.local.remove(key);
        }
        all_ok &= self.inner.session.remove(&keys.session);

        if let Some(adapter) = self.structured() {
            if !adapter.delete(namespace).await {
                warn!(namespace = %namespace, "structured store delete failed");
            }
        }

        self.reset_corruption_count(namespace);
        if let Ok(mut last_restore) = self.inner.last_restore.lock() {
            last_restore.remove(&namespace);
        }

        info!(namespace = %namespace, all_ok, "namespace cleared");
        all_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> PermanentStorage {
        PermanentStorage::new(StorageBackends::in_memory())
    }

    fn quiet() -> StorageOptions {
        StorageOptions {
            validate_after_save: false,
            ..StorageOptions::default()
        }
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let storage = engine();
        assert!(!storage.is_ready());
        assert!(storage.initialize(Some(quiet())).await);
        assert!(storage.initialize(Some(StorageOptions::default())).await);
        // First options win.
        assert!(!storage.options().validate_after_save);
    }

    #[tokio::test]
    async fn test_missing_structured_store_degrades() {
        let storage = engine();
        assert!(storage.initialize(None).await);
        assert!(storage.structured().is_none());
    }

    #[tokio::test]
    async fn test_secure_and_session_tiers_follow_flags() {
        let storage = engine();
        storage
            .initialize(Some(StorageOptions {
                use_secure_backup: false,
                use_session_storage: false,
                ..quiet()
            }))
            .await;

        assert!(storage.save_data(Namespace::Settings, &json!({"theme": "dark"})).await);
        let keys = Namespace::Settings.keys();
        assert!(storage.local().get_raw(&keys.secure).is_none());
        assert!(storage.session().get_raw(&keys.session).is_none());
        assert!(storage.local().get_raw(&keys.persistent).is_some());
    }

    #[test]
    fn test_restore_slot_cooldown() {
        let storage = engine();
        assert!(storage.claim_restore_slot(Namespace::Quotes, Duration::from_secs(3600)));
        assert!(!storage.claim_restore_slot(Namespace::Quotes, Duration::from_secs(3600)));
        assert!(storage.claim_restore_slot(Namespace::Invoices, Duration::from_secs(3600)));
        assert!(storage.claim_restore_slot(Namespace::Quotes, Duration::ZERO));
    }
}
