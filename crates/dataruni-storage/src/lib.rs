//! Dataruni Storage Engine
//!
//! Embedded key-value engine on top of SQLite.
//! One file per named database, `PRAGMA user_version` as the schema version,
//! one table per container (object store).

mod database;
mod engine;
mod error;
mod schema;

pub use database::Database;
pub use engine::{DeleteOutcome, Engine, MAX_VERSION};
pub use error::StorageError;
pub use schema::{UpgradeEvent, UpgradeTransaction};

pub type Result<T> = std::result::Result<T, StorageError>;
