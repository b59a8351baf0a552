//! Database engine: versioned open, deletion and live-handle bookkeeping

use parking_lot::Mutex;
use rusqlite::{Connection, TransactionBehavior};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::database::Database;
use crate::error::StorageError;
use crate::schema::{get_schema_version, set_schema_version, UpgradeEvent, UpgradeTransaction};
use crate::Result;

const FILE_EXTENSION: &str = "sqlite3";

/// `PRAGMA user_version` is a signed 32-bit integer.
pub const MAX_VERSION: u32 = i32::MAX as u32;

/// How long a versioned open waits on another connection's file lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a whole-database deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Other handles to the database were still open.
    Blocked,
}

/// Count of live handles per database file.
#[derive(Clone, Default)]
pub(crate) struct Registry(Arc<Mutex<HashMap<PathBuf, usize>>>);

impl Registry {
    pub(crate) fn acquire(&self, path: &Path) {
        *self.0.lock().entry(path.to_path_buf()).or_insert(0) += 1;
    }

    pub(crate) fn release(&self, path: &Path) {
        let mut live = self.0.lock();
        if let Some(count) = live.get_mut(path) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                live.remove(path);
            }
        }
    }

    fn live(&self, path: &Path) -> usize {
        self.0.lock().get(path).copied().unwrap_or(0)
    }
}

/// Root of a set of named databases living in one directory.
#[derive(Clone)]
pub struct Engine {
    root: PathBuf,
    registry: Registry,
}

impl Engine {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            registry: Registry::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing the database called `name`.
    pub fn database_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self
            .root
            .join(format!("{}.{}", encode_name(name), FILE_EXTENSION)))
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.database_path(name)?.exists())
    }

    /// Number of open handles to `name` issued by this engine.
    pub fn live_connections(&self, name: &str) -> Result<usize> {
        Ok(self.registry.live(&self.database_path(name)?))
    }

    /// Open `name` at `version`, creating the file if needed.
    ///
    /// When `version` is higher than the stored version, `on_upgrade` runs
    /// inside the version-bump transaction. Versioned opens of the same file
    /// are serialized by `BEGIN IMMEDIATE`.
    pub fn open<F>(&self, name: &str, version: u32, on_upgrade: F) -> Result<Database>
    where
        F: FnOnce(&UpgradeTransaction<'_>, UpgradeEvent) -> Result<()>,
    {
        if version == 0 || version > MAX_VERSION {
            return Err(StorageError::InvalidVersion(version));
        }

        let path = self.database_path(name)?;
        fs::create_dir_all(&self.root)?;

        let mut conn = Connection::open(&path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        // WAL mode for better concurrent performance
        let _: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let stored = get_schema_version(&tx)?;

        if version < stored {
            return Err(StorageError::VersionMismatch {
                requested: version,
                stored,
            });
        }

        if version > stored {
            let event = UpgradeEvent {
                old_version: stored,
                new_version: version,
            };
            on_upgrade(&UpgradeTransaction::new(&tx), event)?;
            set_schema_version(&tx, version)?;

            tracing::info!(
                db_name = %name,
                old_version = stored,
                new_version = version,
                "Schema upgraded"
            );
        }

        tx.commit()?;

        Ok(Database::new(
            name.to_string(),
            version,
            path,
            conn,
            self.registry.clone(),
        ))
    }

    /// Remove the database files for `name`.
    ///
    /// Deleting a database that does not exist succeeds. With live handles
    /// the outcome is `Blocked`; the files are still removed where the
    /// platform allows it.
    pub fn delete_database(&self, name: &str) -> Result<DeleteOutcome> {
        let path = self.database_path(name)?;
        let live = self.registry.live(&path);
        let blocked = live > 0;

        if blocked {
            tracing::warn!(
                db_name = %name,
                live_connections = live,
                "Database deletion blocked by open connections"
            );
        }

        for file in database_files(&path) {
            match fs::remove_file(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) if blocked && e.kind() == ErrorKind::PermissionDenied => {
                    return Ok(DeleteOutcome::Blocked);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!(db_name = %name, "Deleted database");

        Ok(if blocked {
            DeleteOutcome::Blocked
        } else {
            DeleteOutcome::Deleted
        })
    }
}

/// Main file plus the WAL side files.
fn database_files(path: &Path) -> [PathBuf; 3] {
    let with_suffix = |suffix: &str| {
        let mut name: OsString = path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    };
    [path.to_path_buf(), with_suffix("-wal"), with_suffix("-shm")]
}

/// Percent-encode everything outside `[a-z0-9._-]`.
///
/// Uppercase letters are encoded too, so names differing only in case get
/// distinct files on case-insensitive filesystems.
fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        let literal = byte.is_ascii_lowercase()
            || byte.is_ascii_digit()
            || matches!(byte, b'.' | b'_' | b'-');
        if literal {
            out.push(byte as char);
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}
