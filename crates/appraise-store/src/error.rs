//! Error types for the persistence layer.

use thiserror::Error;

/// Errors that can occur in the persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database open/connection error
    #[error("failed to open database: {0}")]
    Open(String),

    /// Database query error
    #[error("database query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Migration failure; the store refuses to operate
    #[error("schema migration {name} failed: {message}")]
    Migration { name: String, message: String },

    /// On-disk schema is newer than this build supports
    #[error("database schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: i32, supported: i32 },

    /// Referenced assessment does not exist
    #[error("assessment not found: {id}")]
    NotFound { id: String },

    /// Stored row cannot be decoded back into a domain value
    #[error("corrupt stored record: {0}")]
    Corrupt(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}
