//! Per-entity storage facades.
//!
//! The facades sit on the engine and add what the engine does not know
//! about: legacy key migration, default synthesis when nothing is stored,
//! and whole-document CRUD helpers.

pub mod clients;
pub mod company;
pub mod crud;
pub mod legacy;

pub use clients::ClientStore;
pub use company::CompanyStore;
pub use legacy::{scan_legacy, LegacyHit, LegacySources};
