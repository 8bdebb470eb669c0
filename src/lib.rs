// ./src/lib.rs
//! Redundant client-side persistence for the Mok Mzansi Books back office.
//!
//! Data flows UI -> facade ([`ClientStore`], [`CompanyStore`]) ->
//! [`PermanentStorage`] -> key-value and structured-store backends.

pub mod config;
pub mod engine;
pub mod error;
pub mod facade;
pub mod logging;
pub mod storage;
pub mod types;

pub use config::{StorageConfig, StorageOptions};
pub use engine::PermanentStorage;
pub use error::{Result, StorageError};
pub use facade::{ClientStore, CompanyStore};
pub use storage::StorageBackends;
pub use types::{Client, ClientCategory, ClientsState, CompanyDetails, Namespace, Outcome, Tier};
