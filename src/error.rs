//! Error types for the Vantage evaluation platform
//!
//! This module provides structured error handling using thiserror, with one
//! variant per failure category the HTTP layer needs to distinguish.

use thiserror::Error;

/// Main error type for Vantage operations
#[derive(Error, Debug)]
pub enum VantageError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migration(String),

    /// Requested entity does not exist (form, assignment, user, ...)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request payload is missing required fields or malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation conflicts with current state (e.g. duplicate submission)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Login or session verification failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid identifier format
    #[error("Invalid id: {0}")]
    InvalidId(#[from] uuid::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Vantage operations
pub type Result<T> = std::result::Result<T, VantageError>;

impl From<libsql::Error> for VantageError {
    fn from(err: libsql::Error) -> Self {
        VantageError::Database(err.to_string())
    }
}

impl From<anyhow::Error> for VantageError {
    fn from(err: anyhow::Error) -> Self {
        VantageError::Other(err.to_string())
    }
}
