//! Open database handle and single-key operations

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::Registry;
use crate::error::StorageError;
use crate::schema::{contains_store, quote_ident, store_names};
use crate::Result;

/// Live connection to one named database.
///
/// Clones share the same connection. `close` affects every clone.
pub struct Database {
    inner: Arc<Inner>,
}

struct Inner {
    id: Uuid,
    name: String,
    version: u32,
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
    registry: Registry,
}

impl Database {
    pub(crate) fn new(
        name: String,
        version: u32,
        path: PathBuf,
        conn: Connection,
        registry: Registry,
    ) -> Self {
        registry.acquire(&path);

        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                name,
                version,
                path,
                conn: Mutex::new(Some(conn)),
                registry,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn version(&self) -> u32 {
        self.inner.version
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// True when both values refer to the same underlying connection.
    pub fn same_handle(&self, other: &Database) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.conn.lock().is_none()
    }

    /// Close the connection. Safe to call more than once.
    pub fn close(&self) {
        self.inner.shutdown();
    }

    pub fn store_names(&self) -> Result<Vec<String>> {
        self.with_connection(store_names)
    }

    pub fn contains_store(&self, store: &str) -> Result<bool> {
        self.with_connection(|conn| contains_store(conn, store))
    }

    /// Read the record stored under `key`, if any.
    pub fn get<T: DeserializeOwned>(&self, store: &str, key: &str) -> Result<Option<T>> {
        let raw: Option<String> = self.with_connection(|conn| {
            let value = conn
                .query_row(
                    &format!("SELECT value FROM {} WHERE key = ?1", quote_ident(store)),
                    [key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Insert or overwrite the record stored under `key`.
    pub fn put<T: Serialize + ?Sized>(&self, store: &str, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let updated_at = Utc::now().to_rfc3339();

        self.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (key, value, updated_at) VALUES (?1, ?2, ?3)",
                    quote_ident(store)
                ),
                rusqlite::params![key, json, updated_at],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.inner.conn.lock();
        let conn = conn.as_ref().ok_or(StorageError::Closed)?;
        f(conn)
    }

    fn with_connection_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.inner.conn.lock();
        let conn = conn.as_mut().ok_or(StorageError::Closed)?;
        f(conn)
    }
}

impl Inner {
    fn shutdown(&self) {
        let conn = self.conn.lock().take();
        if let Some(conn) = conn {
            if let Err((_, e)) = conn.close() {
                tracing::warn!(db_name = %self.name, error = %e, "Failed to close database cleanly");
            }
            self.registry.release(&self.path);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("version", &self.inner.version)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Engine;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Layout {
        sidebar_open: bool,
        panels: Vec<String>,
    }

    fn open_app(engine: &Engine) -> Database {
        engine
            .open("app", 1, |tx, _| tx.create_store("dataruni-store"))
            .unwrap()
    }

    #[test]
    fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_app(&Engine::new(dir.path()));

        let layout = Layout {
            sidebar_open: true,
            panels: vec!["files".to_string(), "search".to_string()],
        };
        db.put("dataruni-store", "layout", &layout).unwrap();

        let loaded: Option<Layout> = db.get("dataruni-store", "layout").unwrap();
        assert_eq!(loaded, Some(layout));
    }

    #[test]
    fn test_get_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_app(&Engine::new(dir.path()));

        let loaded: Option<String> = db.get("dataruni-store", "nothing").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_app(&Engine::new(dir.path()));

        db.put("dataruni-store", "theme", "light").unwrap();
        db.put("dataruni-store", "theme", "dark").unwrap();

        let loaded: Option<String> = db.get("dataruni-store", "theme").unwrap();
        assert_eq!(loaded.as_deref(), Some("dark"));
    }

    #[test]
    fn test_missing_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_app(&Engine::new(dir.path()));

        let result: Result<Option<String>> = db.get("other-store", "k");
        assert!(matches!(result, Err(StorageError::Sqlite(_))));
    }

    #[test]
    fn test_closed_handle() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_app(&Engine::new(dir.path()));
        let clone = db.clone();

        db.close();
        db.close();

        assert!(clone.is_closed());
        assert!(clone.same_handle(&db));
        assert!(matches!(
            clone.put("dataruni-store", "k", &1),
            Err(StorageError::Closed)
        ));
    }

    #[test]
    fn test_drop_releases_handle() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(dir.path());

        let db = open_app(&engine);
        let clone = db.clone();
        drop(db);
        assert_eq!(engine.live_connections("app").unwrap(), 1);

        drop(clone);
        assert_eq!(engine.live_connections("app").unwrap(), 0);
    }
}
