//! Recovery for databases that lost their object store
//!
//! Drops the cached handle, deletes the whole database and opens it again
//! from scratch. The reopen runs with recovery disabled, so a database that
//! still lacks the store afterwards fails instead of looping.

use dataruni_storage::{Database, DeleteOutcome};

use crate::config::{DataruniConfig, ResolvedConfig};
use crate::connection::{missing_container, ConnectionManager, Opened};
use crate::error::DataruniError;
use crate::native;
use crate::Result;

impl ConnectionManager {
    /// Delete and recreate the database named by `config`.
    pub async fn recreate(&self, config: &DataruniConfig) -> Result<Database> {
        self.recreate_resolved(&config.resolve()).await
    }

    pub(crate) async fn recreate_resolved(&self, resolved: &ResolvedConfig) -> Result<Database> {
        tracing::warn!(
            db_name = %resolved.db_name,
            store_name = %resolved.store_name,
            "Recreating database due to missing object store"
        );

        self.reset();

        let engine = self.engine().clone();
        let name = resolved.db_name.clone();
        let outcome = native::run(move || engine.delete_database(&name))
            .await
            .map_err(|source| DataruniError::Recovery {
                db_name: resolved.db_name.clone(),
                source,
            })?;

        if outcome == DeleteOutcome::Blocked {
            tracing::warn!(db_name = %resolved.db_name, "Database deletion blocked, continuing");
        }

        match self.open_resolved(resolved, false).await? {
            Opened::Ready(db) => Ok(db),
            Opened::MissingContainer => Err(missing_container(resolved)),
        }
    }
}
