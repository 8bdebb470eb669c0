//! Namespaces and the physical key names derived from them.
//!
//! Key names are a compatibility contract with data written by earlier
//! releases and by external migration tooling, so they must stay bit-exact.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Prefix shared by every key-value key the engine writes.
pub const KEY_PREFIX: &str = "mok-mzansi-books";

/// Logical document category. Each namespace maps to exactly one stored document.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Company,
    Clients,
    Invoices,
    Quotes,
    Settings,
    User,
}

impl Namespace {
    /// All namespaces, in the order the structured store creates them.
    pub const ALL: [Namespace; 6] = [
        Namespace::Company,
        Namespace::Clients,
        Namespace::Invoices,
        Namespace::Quotes,
        Namespace::Settings,
        Namespace::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Company => "company",
            Namespace::Clients => "clients",
            Namespace::Invoices => "invoices",
            Namespace::Quotes => "quotes",
            Namespace::Settings => "settings",
            Namespace::User => "user",
        }
    }

    pub fn keys(&self) -> StorageKeySet {
        StorageKeySet::for_namespace(*self)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Namespace::ALL
            .iter()
            .copied()
            .find(|ns| ns.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StorageError::UnknownNamespace(s.to_string()))
    }
}

/// One physical location inside a namespace's redundancy set.
///
/// Variant order is the load fallback order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    Primary,
    Backup1,
    Backup2,
    Persistent,
    Secure,
    Session,
    Structured,
}

impl Tier {
    /// Read order used by `load_data`.
    pub const LOAD_ORDER: [Tier; 7] = [
        Tier::Primary,
        Tier::Backup1,
        Tier::Backup2,
        Tier::Persistent,
        Tier::Secure,
        Tier::Session,
        Tier::Structured,
    ];

    /// Source order used by restoration; the primary is presumed corrupt.
    pub const RESTORE_ORDER: [Tier; 6] = [
        Tier::Backup1,
        Tier::Backup2,
        Tier::Persistent,
        Tier::Secure,
        Tier::Session,
        Tier::Structured,
    ];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Primary => "primary",
            Tier::Backup1 => "backup-1",
            Tier::Backup2 => "backup-2",
            Tier::Persistent => "persistent",
            Tier::Secure => "secure",
            Tier::Session => "session",
            Tier::Structured => "structured",
        };
        f.write_str(name)
    }
}

/// Every physical key for one namespace. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeySet {
    pub primary: String,
    pub backup_1: String,
    pub backup_2: String,
    pub secure: String,
    pub persistent: String,
    /// Lives in the session store, not the local store.
    pub session: String,
    /// Structured-store object store name.
    pub store_name: String,
    /// Fixed record key inside `store_name`.
    pub record_key: String,
}

impl StorageKeySet {
    pub fn for_namespace(namespace: Namespace) -> Self {
        let primary = format!("{}-{}", KEY_PREFIX, namespace);
        Self {
            backup_1: format!("{}-backup-1", primary),
            backup_2: format!("{}-backup-2", primary),
            secure: format!("{}-secure", primary),
            persistent: format!("{}-persistent", primary),
            session: format!("{}-session", primary),
            store_name: format!("{}Store", namespace),
            record_key: format!("{}Data", namespace),
            primary,
        }
    }

    /// Key-value key for a tier, or `None` for the structured tier.
    pub fn key_for(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::Primary => Some(&self.primary),
            Tier::Backup1 => Some(&self.backup_1),
            Tier::Backup2 => Some(&self.backup_2),
            Tier::Persistent => Some(&self.persistent),
            Tier::Secure => Some(&self.secure),
            Tier::Session => Some(&self.session),
            Tier::Structured => None,
        }
    }

    /// Keys that live in the local (durable) key-value store.
    pub fn local_keys(&self) -> [&str; 5] {
        [
            &self.primary,
            &self.backup_1,
            &self.backup_2,
            &self.secure,
            &self.persistent,
        ]
    }
}
