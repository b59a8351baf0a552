//! Composition root
//!
//! Wires one engine, one connection manager and one store accessor
//! together. Applications create a `Dataruni` at startup and hand out
//! accessors or bindings from it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use dataruni_storage::Engine;

use crate::binding::PersistedValue;
use crate::config::{DataruniConfig, Settings};
use crate::connection::ConnectionManager;
use crate::store::StoreAccessor;
use crate::Result;

pub struct Dataruni {
    settings: Settings,
    store: StoreAccessor,
}

impl Dataruni {
    pub fn new(settings: Settings) -> Self {
        let engine = Engine::new(settings.data_dir.clone());
        let connections = Arc::new(ConnectionManager::new(engine));

        tracing::info!(data_dir = %settings.data_dir.display(), "Dataruni initialized");

        Self {
            settings,
            store: StoreAccessor::new(connections),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &StoreAccessor {
        &self.store
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        self.store.connections()
    }

    pub async fn get<T>(&self, key: &str, config: &DataruniConfig) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.store.get(key, config).await
    }

    pub async fn set<T>(&self, key: &str, value: &T, config: &DataruniConfig) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.store.set(key, value, config).await
    }

    /// Drop the cached connection; the next request reopens it.
    pub fn reset(&self) {
        self.connections().reset();
    }

    pub fn binding<T>(
        &self,
        key: impl Into<String>,
        default_value: T,
        config: DataruniConfig,
    ) -> PersistedValue<T>
    where
        T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        PersistedValue::new(self.store.clone(), key, default_value, config)
    }
}

impl Default for Dataruni {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}
