//! Store Accessor
//!
//! Single-key reads and writes against the configured object store.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::config::DataruniConfig;
use crate::connection::ConnectionManager;
use crate::error::DataruniError;
use crate::native;
use crate::Result;

#[derive(Clone)]
pub struct StoreAccessor {
    connections: Arc<ConnectionManager>,
}

impl StoreAccessor {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Read the value stored under `key`. A key never written is `None`.
    pub async fn get<T>(&self, key: &str, config: &DataruniConfig) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let db = self.connections.open(config).await?;
        let store = config.resolve().store_name;
        let owned_key = key.to_string();

        native::run(move || db.get::<T>(&store, &owned_key))
            .await
            .map_err(|source| {
                tracing::error!(key = %key, error = %source, "Error getting value");
                DataruniError::Read {
                    key: key.to_string(),
                    source,
                }
            })
    }

    /// Insert or overwrite the value stored under `key`.
    pub async fn set<T>(&self, key: &str, value: &T, config: &DataruniConfig) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value).map_err(|e| DataruniError::Write {
            key: key.to_string(),
            source: e.into(),
        })?;

        let db = self.connections.open(config).await?;
        let store = config.resolve().store_name;
        let owned_key = key.to_string();

        native::run(move || db.put(&store, &owned_key, &value))
            .await
            .map_err(|source| {
                tracing::error!(key = %key, error = %source, "Error setting value");
                DataruniError::Write {
                    key: key.to_string(),
                    source,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataruni_storage::{Engine, StorageError};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Editor {
        font_size: u32,
        theme: String,
        recent: Vec<String>,
        split: Option<(f64, f64)>,
    }

    fn accessor(dir: &tempfile::TempDir) -> StoreAccessor {
        StoreAccessor::new(Arc::new(ConnectionManager::new(Engine::new(dir.path()))))
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = accessor(&dir);
        let config = DataruniConfig::new("app");

        let editor = Editor {
            font_size: 14,
            theme: "solarized".to_string(),
            recent: vec!["a.rs".to_string(), "b.rs".to_string()],
            split: Some((0.25, 0.75)),
        };
        store.set("editor", &editor, &config).await.unwrap();

        let loaded: Option<Editor> = store.get("editor", &config).await.unwrap();
        assert_eq!(loaded, Some(editor));
    }

    #[tokio::test]
    async fn test_nested_json_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = accessor(&dir);
        let config = DataruniConfig::new("app").with_store("prefs");

        let value = json!({ "tabs": [{ "id": 1, "pinned": true }], "zoom": null });
        store.set("layout", &value, &config).await.unwrap();

        let loaded: Option<serde_json::Value> = store.get("layout", &config).await.unwrap();
        assert_eq!(loaded, Some(value));
    }

    #[tokio::test]
    async fn test_get_unknown_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = accessor(&dir);

        let loaded: Option<String> = store
            .get("never-written", &DataruniConfig::new("app"))
            .await
            .unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = accessor(&dir);
        let config = DataruniConfig::new("app");

        store.set("count", &1, &config).await.unwrap();
        store.set("count", &2, &config).await.unwrap();

        assert_eq!(store.get::<i32>("count", &config).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_concurrent_sets_keep_one_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = accessor(&dir);
        let config = DataruniConfig::new("app");

        let (a, b) = tokio::join!(
            store.set("color", "red", &config),
            store.set("color", "blue", &config)
        );
        a.unwrap();
        b.unwrap();

        let loaded = store.get::<String>("color", &config).await.unwrap().unwrap();
        assert!(loaded == "red" || loaded == "blue");
    }

    #[tokio::test]
    async fn test_stores_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let store = accessor(&dir);
        let first = DataruniConfig::new("app").with_store("one");
        let second = DataruniConfig::new("app").with_store("two").with_version(2);

        store.set("k", "first", &first).await.unwrap();

        assert_eq!(store.get::<String>("k", &second).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_recovers_dropped_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = accessor(&dir);
        let config = DataruniConfig::new("X").with_store("S");

        store.set("k", "v", &config).await.unwrap();

        let path = store.connections().engine().database_path("X").unwrap();
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.execute_batch("DROP TABLE \"S\";").unwrap();
        drop(conn);

        let loaded: Option<String> = store.get("k", &config).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_type_mismatch_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = accessor(&dir);
        let config = DataruniConfig::new("app");

        store.set("count", "not a number", &config).await.unwrap();

        let err = store.get::<u32>("count", &config).await.unwrap_err();
        assert!(matches!(
            err,
            DataruniError::Read {
                source: StorageError::Json(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_connection_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let store = accessor(&dir);

        let err = store
            .set("k", &1, &DataruniConfig::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, DataruniError::Connection { .. }));
    }
}
