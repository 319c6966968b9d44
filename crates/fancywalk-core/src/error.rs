//! Core error types for fancywalk-core.
//!
//! One thiserror enum per concern, folded into [`CoreError`] for callers
//! that don't care which layer failed.

use std::path::PathBuf;
use thiserror::Error;

use crate::health::HealthMetric;

/// Core error type for fancywalk-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Health-data provider errors
    #[error("Health data error: {0}")]
    Health(#[from] HealthError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Storage-specific errors.
///
/// Every failed commit surfaces as one of these; the store never drops a
/// write silently.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// No record with this identity
    #[error("No {collection} record with id {id}")]
    NotFound { collection: &'static str, id: i64 },

    /// A stored row could not be decoded
    #[error("Corrupt {collection} row {id}: {message}")]
    Corrupt {
        collection: &'static str,
        id: i64,
        message: String,
    },
}

impl StorageError {
    /// Turn a lenient delete result into a strict one.
    ///
    /// # Errors
    /// Returns [`StorageError::NotFound`] when `deleted` is false.
    pub fn require_deleted(
        deleted: bool,
        collection: &'static str,
        id: i64,
    ) -> Result<(), StorageError> {
        if deleted {
            Ok(())
        } else {
            Err(StorageError::NotFound { collection, id })
        }
    }
}

/// Health-data provider errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HealthError {
    /// No health data service on this device
    #[error("Health data is not available on this device")]
    Unavailable,

    /// The user denied access
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    /// A read was attempted before access was granted
    #[error("Health data access has not been granted")]
    NotAuthorized,

    /// A read query failed
    #[error("Failed to read {metric}: {message}")]
    QueryFailed {
        metric: HealthMetric,
        message: String,
    },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end_time ({end}) must not be before start_time ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                StorageError::Locked
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
