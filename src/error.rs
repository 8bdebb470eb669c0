// ./src/error.rs
//! Error types for the storage core
//!
//! Every layer below the facades converts these into `bool`/`Option`
//! sentinels at its boundary; the facades and CRUD helpers surface them
//! to callers as typed results.

use std::time::Duration;

use thiserror::Error;

use crate::types::Namespace;

/// The main error type for the storage library
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageError {
    /// Filesystem or device failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Backing store refused a write because it is full
    #[error("Storage quota exceeded while writing `{key}`")]
    QuotaExceeded { key: String },

    /// JSON encode or decode failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Secure-tier payload could not be decoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Backend missing in this runtime
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    /// Structured-store call exceeded its time bound
    #[error("Structured store operation timed out after {0:?}")]
    Timeout(Duration),

    /// Structured-store failure
    #[error("Structured store error: {0}")]
    Structured(String),

    /// Lock held by a panicked thread
    #[error("Storage lock poisoned")]
    LockPoisoned,

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// No redundancy tier accepted the write
    #[error("Failed to persist data for namespace `{0}`")]
    WriteFailed(Namespace),

    /// Stored JSON exists but does not have the expected shape
    #[error("Stored data for namespace `{namespace}` could not be decoded: {reason}")]
    Undecodable { namespace: Namespace, reason: String },

    /// Namespace tag not recognised
    #[error("Unknown namespace: {0}")]
    UnknownNamespace(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Structured(err.to_string())
    }
}

impl From<base64::DecodeError> for StorageError {
    fn from(err: base64::DecodeError) -> Self {
        StorageError::Encoding(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for StorageError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        StorageError::Encoding(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::Structured(format!("background task failed: {}", err))
    }
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, StorageError>;
