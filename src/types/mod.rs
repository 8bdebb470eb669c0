//! Core type definitions for the storage library
//!
//! Namespaces and their derived key sets live in [`namespace`]; the
//! records the facades persist live in [`records`].

pub mod namespace;
pub mod records;

// Re-export core types
pub use namespace::{Namespace, StorageKeySet, Tier, KEY_PREFIX};
pub use records::{Client, ClientCategory, ClientsState, CompanyDetails, Outcome};
