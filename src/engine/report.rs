//! Diagnostics and whole-store snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::PermanentStorage;
use crate::types::{Namespace, Tier};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// State of one tier of a namespace.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TierReport {
    pub tier: Tier,
    pub present: bool,
    pub valid_json: bool,
    /// Hex SHA-256 of the decoded payload.
    pub digest: Option<String>,
    pub matches_primary: bool,
}

/// Per-tier health of one namespace.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceReport {
    pub namespace: Namespace,
    pub tiers: Vec<TierReport>,
    pub corruption_count: u32,
}

impl NamespaceReport {
    /// Every present tier agrees with a valid primary.
    pub fn is_converged(&self) -> bool {
        let primary_valid = self
            .tiers
            .iter()
            .any(|t| t.tier == Tier::Primary && t.valid_json);
        primary_valid && self.tiers.iter().filter(|t| t.present).all(|t| t.matches_primary)
    }
}

/// Portable copy of every namespace's current document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub namespaces: BTreeMap<Namespace, Value>,
}

/// Result of [`PermanentStorage::import_snapshot`].
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub written: Vec<Namespace>,
    pub failed: Vec<Namespace>,
}

fn digest(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

impl PermanentStorage {
    /// Report presence, validity and agreement of every tier.
    ///
    /// Read-only: nothing is healed or restored.
    pub async fn inspect(&self, namespace: Namespace) -> NamespaceReport {
        self.initialize(None).await;

        let mut tiers = Vec::with_capacity(Tier::LOAD_ORDER.len());
        let mut primary_digest = None;
        for tier in Tier::LOAD_ORDER {
            let raw = self.read_tier_raw(namespace, tier).await;
            let valid_json = raw
                .as_deref()
                .map(|raw| serde_json::from_str::<Value>(raw).is_ok())
                .unwrap_or(false);
            let tier_digest = raw.as_deref().map(digest);
            if tier == Tier::Primary {
                primary_digest = tier_digest.clone();
            }
            tiers.push(TierReport {
                tier,
                present: raw.is_some(),
                valid_json,
                matches_primary: tier_digest.is_some() && tier_digest == primary_digest,
                digest: tier_digest,
            });
        }

        NamespaceReport {
            namespace,
            tiers,
            corruption_count: self.corruption_count(namespace),
        }
    }

    /// Gather every namespace that currently holds data.
    pub async fn export_snapshot(&self) -> Snapshot {
        let mut namespaces = BTreeMap::new();
        for namespace in Namespace::ALL {
            if let Some(value) = self.load_data::<Value>(namespace).await {
                namespaces.insert(namespace, value);
            }
        }
        info!(count = namespaces.len(), "snapshot exported");
        Snapshot {
            version: SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            namespaces,
        }
    }

    /// Save each namespace of `snapshot` through the full fan-out.
    pub async fn import_snapshot(&self, snapshot: &Snapshot) -> ImportSummary {
        if snapshot.version > SNAPSHOT_VERSION {
            warn!(
                version = snapshot.version,
                supported = SNAPSHOT_VERSION,
                "snapshot is newer than this build, importing anyway"
            );
        }

        let mut summary = ImportSummary::default();
        for (namespace, value) in &snapshot.namespaces {
            if self.save_data(*namespace, value).await {
                summary.written.push(*namespace);
            } else {
                summary.failed.push(*namespace);
            }
        }
        info!(
            written = summary.written.len(),
            failed = summary.failed.len(),
            "snapshot imported"
        );
        summary
    }
}
