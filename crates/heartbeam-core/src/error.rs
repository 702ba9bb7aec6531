//! Core error types for heartbeam-core.
//!
//! This module defines the error hierarchy using thiserror. Status and
//! eligibility functions never fail on their own; everything here comes from
//! argument validation, configuration, or the data layer.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for heartbeam-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Failures raised by a `StudyData` implementation
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid caller-supplied arguments
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Data-access errors. These are surfaced to callers unmodified.
#[derive(Error, Debug)]
pub enum DataError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// No participant with the given id
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A stored value could not be decoded
    #[error("Malformed {field} in stored record: {value}")]
    Decode { field: String, value: String },

    /// Backing service unreachable
    #[error("Data source unavailable: {0}")]
    Unavailable(String),
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

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Home directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Unparseable calendar date
    #[error("Invalid date for '{field}': expected YYYY-MM-DD, got '{value}'")]
    InvalidDate { field: String, value: String },
}

impl From<rusqlite::Error> for DataError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => {
                if code.code == rusqlite::ErrorCode::DatabaseLocked {
                    DataError::Locked
                } else {
                    DataError::QueryFailed(err.to_string())
                }
            }
            _ => DataError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Data(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_message_names_field() {
        let err = ValidationError::InvalidValue {
            field: "mode".into(),
            message: "expected 'pre' or 'post', got 'mid'".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for 'mode': expected 'pre' or 'post', got 'mid'"
        );
    }

    #[test]
    fn data_error_wraps_into_core_error() {
        let err: CoreError = DataError::ParticipantNotFound("u-1".into()).into();
        assert!(matches!(err, CoreError::Data(DataError::ParticipantNotFound(_))));
        assert_eq!(err.to_string(), "Data error: Participant not found: u-1");
    }

    #[test]
    fn locked_sqlite_maps_to_locked() {
        let sqlite_err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            None,
        );
        assert!(matches!(DataError::from(sqlite_err), DataError::Locked));
    }
}
