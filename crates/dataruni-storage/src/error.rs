//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid database name: {0:?}")]
    InvalidName(String),

    #[error("Invalid schema version: {0}")]
    InvalidVersion(u32),

    #[error("Requested version {requested} is lower than stored version {stored}")]
    VersionMismatch { requested: u32, stored: u32 },

    #[error("Database connection is closed")]
    Closed,

    #[error("Native request interrupted: {0}")]
    Interrupted(String),
}
