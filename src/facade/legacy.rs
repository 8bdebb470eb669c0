//! Historical key names still read for migration.
//!
//! These lists are append-only. New entries go where their age dictates:
//! newest convention first within `primary`, then `backup`.

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::storage::KeyValueAdapter;

/// An ordered set of legacy keys for one entity.
#[derive(Debug, Clone, Copy)]
pub struct LegacySources {
    pub primary: &'static [&'static str],
    pub backup: &'static [&'static str],
}

impl LegacySources {
    /// Every key in scan order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> {
        self.primary.iter().chain(self.backup.iter()).copied()
    }
}

pub const CLIENT_LEGACY_SOURCES: LegacySources = LegacySources {
    primary: &[
        "mok-mzansi-books-clients",
        "mok-mzansi-books-clients-persistent",
        "mok-mzansi-books-clients-alt1",
        "mok-mzansi-books-clients-alt2",
        "clients",
        "mokClients",
    ],
    backup: &[
        "mok-mzansi-books-clients-backup",
        "mok-mzansi-books-clients-emergency-backup",
    ],
};

/// Keys still written on every clients save so older app builds can read them.
pub const CLIENT_COMPAT_WRITE_KEYS: &[&str] = &["clients", "mok-mzansi-books-clients-backup"];

pub const COMPANY_LEGACY_SOURCES: LegacySources = LegacySources {
    primary: &["companyDetails"],
    backup: &["companyDetails_emergency_backup"],
};

pub const COMPANY_COMPAT_WRITE_KEYS: &[&str] = &["companyDetails"];

/// A legacy value and the key it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyHit<T> {
    pub key: &'static str,
    pub value: T,
}

/// First legacy source that decodes as `T` and satisfies `has_data`.
pub fn scan_legacy<T, F>(
    local: &KeyValueAdapter,
    sources: &LegacySources,
    has_data: F,
) -> Option<LegacyHit<T>>
where
    T: DeserializeOwned,
    F: Fn(&T) -> bool,
{
    for key in sources.keys() {
        let Some(value) = local.load::<T>(key) else {
            continue;
        };
        if has_data(&value) {
            debug!(key, "legacy source has data");
            return Some(LegacyHit { key, value });
        }
    }
    None
}
