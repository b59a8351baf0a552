//! Core error types

use dataruni_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataruniError {
    #[error("Failed to open database {db_name:?}: {source}")]
    Connection {
        db_name: String,
        #[source]
        source: StorageError,
    },

    #[error("Object store {store_name:?} not found in database {db_name:?}")]
    MissingContainer { db_name: String, store_name: String },

    #[error("Failed to recreate database {db_name:?}: {source}")]
    Recovery {
        db_name: String,
        #[source]
        source: StorageError,
    },

    #[error("Error getting {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Error setting {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: StorageError,
    },
}
