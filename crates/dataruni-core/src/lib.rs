//! Dataruni Core
//!
//! Persistent key-value cache for application state.
//! Values live in an embedded database, are read back by key and are
//! exposed to UI code through `PersistedValue` bindings.

mod binding;
mod config;
mod connection;
mod dataruni;
mod error;
mod native;
mod recovery;
mod store;

pub use binding::{PersistedValue, Snapshot, WriteReceipt};
pub use config::{
    DataruniConfig, ResolvedConfig, Settings, DATA_DIR_ENV, DEFAULT_DB_VERSION,
    DEFAULT_STORE_NAME,
};
pub use connection::ConnectionManager;
pub use dataruni::Dataruni;
pub use error::DataruniError;
pub use store::StoreAccessor;

pub use dataruni_storage::{Database, DeleteOutcome, Engine, StorageError};

pub type Result<T> = std::result::Result<T, DataruniError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
