//! Schema versioning and container DDL
//!
//! The schema version lives in `PRAGMA user_version`; 0 means the database
//! file was just created. Containers are plain tables keyed by `key`.

use crate::Result;
use rusqlite::Connection;

/// Version change seen by an upgrade callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeEvent {
    pub old_version: u32,
    pub new_version: u32,
}

impl UpgradeEvent {
    /// True when the database file did not exist before this open.
    pub fn is_new_database(&self) -> bool {
        self.old_version == 0
    }
}

/// Schema access handed to the upgrade callback.
///
/// Runs inside the same `BEGIN IMMEDIATE` transaction that bumps the
/// version, so containers created here only become visible together with
/// the new version.
pub struct UpgradeTransaction<'a> {
    conn: &'a Connection,
}

impl<'a> UpgradeTransaction<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn contains_store(&self, store: &str) -> Result<bool> {
        contains_store(self.conn, store)
    }

    /// Create a container with `key` as its unique field. No-op if it exists.
    pub fn create_store(&self, store: &str) -> Result<()> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
            quote_ident(store)
        ))?;
        Ok(())
    }
}

pub(crate) fn get_schema_version(conn: &Connection) -> Result<u32> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(u32::try_from(version).unwrap_or(0))
}

pub(crate) fn set_schema_version(conn: &Connection, version: u32) -> Result<()> {
    // PRAGMA does not accept bound parameters
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))?;
    Ok(())
}

pub(crate) fn store_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

pub(crate) fn contains_store(conn: &Connection, store: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [store],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Quote a container name for use as an SQL identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
