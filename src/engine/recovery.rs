// ./src/engine/recovery.rs
//! Post-save validation and restoration.
//!
//! Direction matters here. Validation trusts the primary tier and pushes
//! its content outward to the backups. Restoration runs only when the
//! primary is presumed corrupt, so it copies inward from the first intact
//! fallback tier.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::PermanentStorage;
use crate::types::{Namespace, Tier};

/// What one validation pass found and did.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub namespace: Namespace,
    pub primary_valid: bool,
    /// Corruption counter after this pass.
    pub corruption_count: u32,
    /// Backup slots overwritten with the primary's content.
    pub backups_repaired: usize,
    /// `Some(result)` when this pass escalated to restoration.
    pub restored: Option<bool>,
}

impl PermanentStorage {
    /// Re-check the primary tier of `namespace` and re-converge its backups.
    ///
    /// A primary that is missing or not valid JSON bumps the namespace's
    /// corruption counter; once the counter passes the configured threshold
    /// the namespace is restored and the counter reset.
    pub async fn validate(&self, namespace: Namespace) -> ValidationReport {
        let keys = namespace.keys();
        let local = self.local();
        let primary = local
            .get_raw(&keys.primary)
            .filter(|raw| serde_json::from_str::<Value>(raw).is_ok());

        let Some(primary) = primary else {
            let count = self.bump_corruption_count(namespace);
            warn!(namespace = %namespace, count, "primary tier failed validation");

            let threshold = self.options().corruption_threshold;
            let mut report = ValidationReport {
                namespace,
                primary_valid: false,
                corruption_count: count,
                backups_repaired: 0,
                restored: None,
            };
            if count > threshold {
                let restored = self.restore(namespace).await;
                self.reset_corruption_count(namespace);
                report.corruption_count = 0;
                report.restored = Some(restored);
            }
            return report;
        };

        let mut backups_repaired = 0;
        for key in [&keys.backup_1, &keys.backup_2] {
            let in_sync = local.get_raw(key).as_deref() == Some(primary.as_str());
            if !in_sync && local.set_raw(key, &primary) {
                backups_repaired += 1;
            }
        }
        if backups_repaired > 0 {
            info!(namespace = %namespace, backups_repaired, "backups re-converged to primary");
        } else {
            debug!(namespace = %namespace, "validation passed");
        }

        ValidationReport {
            namespace,
            primary_valid: true,
            corruption_count: self.corruption_count(namespace),
            backups_repaired,
            restored: None,
        }
    }

    /// Repopulate the primary tier from the first intact fallback tier.
    ///
    /// A document recovered from the structured store is written back to
    /// every key-value tier, not just the primary.
    pub async fn restore(&self, namespace: Namespace) -> bool {
        let primary_key = namespace.keys().primary;

        for tier in Tier::RESTORE_ORDER {
            let Some(raw) = self.read_tier_raw(namespace, tier).await else {
                continue;
            };
            if serde_json::from_str::<Value>(&raw).is_err() {
                debug!(namespace = %namespace, tier = %tier, "restore source is corrupt, skipping");
                continue;
            }

            let written = if tier == Tier::Structured {
                self.write_key_value_tiers(namespace, &raw)
            } else {
                self.local().set_raw(&primary_key, &raw)
            };
            if written {
                info!(namespace = %namespace, tier = %tier, "primary restored");
                return true;
            }
        }

        error!(namespace = %namespace, "restoration failed, no intact tier available");
        false
    }

    pub fn corruption_count(&self, namespace: Namespace) -> u32 {
        self.inner
            .corruption_counts
            .lock()
            .map(|counts| counts.get(&namespace).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn bump_corruption_count(&self, namespace: Namespace) -> u32 {
        match self.inner.corruption_counts.lock() {
            Ok(mut counts) => {
                let count = counts.entry(namespace).or_insert(0);
                *count += 1;
                *count
            }
            Err(_) => 0,
        }
    }

    pub(crate) fn reset_corruption_count(&self, namespace: Namespace) {
        if let Ok(mut counts) = self.inner.corruption_counts.lock() {
            counts.remove(&namespace);
        }
    }
}
