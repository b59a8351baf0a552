//! Connection Manager
//!
//! Owns the one cached database handle and the configuration it was opened
//! with. Callers always go through `open`, which reuses, reopens, upgrades
//! or recovers the handle as needed.
//!
//! Concurrent `open` calls that both miss the cache each issue a native
//! open. The engine serializes versioned opens and store creation is
//! guarded by an existence check, so both succeed; whichever finishes
//! second closes its own handle and returns the cached one.

use parking_lot::Mutex;

use dataruni_storage::{Database, Engine};

use crate::config::{DataruniConfig, ResolvedConfig};
use crate::error::DataruniError;
use crate::native;
use crate::Result;

#[derive(Default)]
struct ConnectionState {
    handle: Option<Database>,
    active_config: Option<ResolvedConfig>,
}

/// Outcome of one pass through the open sequence.
pub(crate) enum Opened {
    Ready(Database),
    MissingContainer,
}

pub struct ConnectionManager {
    engine: Engine,
    state: Mutex<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            state: Mutex::new(ConnectionState::default()),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Configuration of the last open attempt, if any.
    pub fn active_config(&self) -> Option<ResolvedConfig> {
        self.state.lock().active_config.clone()
    }

    pub fn cached_handle(&self) -> Option<Database> {
        self.state.lock().handle.clone()
    }

    /// Get a live handle for `config`, recovering a missing store if needed.
    pub async fn open(&self, config: &DataruniConfig) -> Result<Database> {
        self.open_with(config, true).await
    }

    pub async fn open_with(
        &self,
        config: &DataruniConfig,
        allow_recovery: bool,
    ) -> Result<Database> {
        let resolved = config.resolve();

        match self.open_resolved(&resolved, allow_recovery).await? {
            Opened::Ready(db) => Ok(db),
            Opened::MissingContainer if allow_recovery => {
                self.recreate_resolved(&resolved).await
            }
            Opened::MissingContainer => Err(missing_container(&resolved)),
        }
    }

    /// Close the cached handle and forget the active configuration.
    pub fn reset(&self) {
        let previous = {
            let mut state = self.state.lock();
            state.active_config = None;
            state.handle.take()
        };

        if let Some(db) = previous {
            tracing::debug!(db_name = %db.name(), handle = %db.id(), "Closing database connection");
            db.close();
        }
    }

    pub(crate) async fn open_resolved(
        &self,
        resolved: &ResolvedConfig,
        allow_recovery: bool,
    ) -> Result<Opened> {
        if let Some(db) = self.cached_for(resolved) {
            if store_present(&db, &resolved.store_name) {
                return Ok(Opened::Ready(db));
            }
            if allow_recovery {
                return Ok(Opened::MissingContainer);
            }
            tracing::debug!(
                db_name = %resolved.db_name,
                store_name = %resolved.store_name,
                "Cached handle lost its object store, reopening"
            );
        }

        let previous = {
            let mut state = self.state.lock();
            state.active_config = Some(resolved.clone());
            state.handle.take()
        };
        if let Some(db) = previous {
            db.close();
        }

        let db = self.open_native(resolved).await?;

        if !store_present(&db, &resolved.store_name) {
            tracing::warn!(
                db_name = %resolved.db_name,
                store_name = %resolved.store_name,
                available = ?db.store_names().unwrap_or_default(),
                "Object store missing after open"
            );
            db.close();
            let cached = self.state.lock().handle.take();
            if let Some(cached) = cached {
                cached.close();
            }
            return Ok(Opened::MissingContainer);
        }

        Ok(Opened::Ready(self.install(resolved, db)))
    }

    fn cached_for(&self, resolved: &ResolvedConfig) -> Option<Database> {
        let state = self.state.lock();
        match (&state.handle, &state.active_config) {
            (Some(db), Some(active)) if active == resolved && !db.is_closed() => Some(db.clone()),
            _ => None,
        }
    }

    async fn open_native(&self, resolved: &ResolvedConfig) -> Result<Database> {
        let engine = self.engine.clone();
        let name = resolved.db_name.clone();
        let version = resolved.db_version;
        let store = resolved.store_name.clone();

        native::run(move || {
            engine.open(&name, version, |tx, event| {
                if !tx.contains_store(&store)? {
                    tx.create_store(&store)?;
                    tracing::info!(
                        db_name = %name,
                        store_name = %store,
                        old_version = event.old_version,
                        "Created object store"
                    );
                }
                Ok(())
            })
        })
        .await
        .map_err(|source| {
            tracing::error!(
                db_name = %resolved.db_name,
                db_version = resolved.db_version,
                error = %source,
                "Database initialization failed"
            );
            DataruniError::Connection {
                db_name: resolved.db_name.clone(),
                source,
            }
        })
    }

    /// Cache a freshly opened handle, unless a concurrent open for the same
    /// configuration already did.
    fn install(&self, resolved: &ResolvedConfig, db: Database) -> Database {
        let mut state = self.state.lock();

        let existing = match (&state.handle, &state.active_config) {
            (Some(cached), Some(active)) if active == resolved && !cached.is_closed() => {
                Some(cached.clone())
            }
            _ => None,
        };

        if let Some(cached) = existing {
            drop(state);
            db.close();
            return cached;
        }

        state.active_config = Some(resolved.clone());
        let previous = state.handle.replace(db.clone());
        drop(state);

        if let Some(previous) = previous {
            previous.close();
        }

        tracing::debug!(db_name = %db.name(), handle = %db.id(), "Database connection cached");
        db
    }
}

pub(crate) fn missing_container(resolved: &ResolvedConfig) -> DataruniError {
    DataruniError::MissingContainer {
        db_name: resolved.db_name.clone(),
        store_name: resolved.store_name.clone(),
    }
}

/// Schema lookup on an open handle. A failed lookup counts as missing.
fn store_present(db: &Database, store: &str) -> bool {
    match db.contains_store(store) {
        Ok(present) => present,
        Err(e) => {
            tracing::warn!(
                db_name = %db.name(),
                store_name = %store,
                error = %e,
                "Failed to list object stores"
            );
            false
        }
    }
}
