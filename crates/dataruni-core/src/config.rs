//! Cache configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_STORE_NAME: &str = "dataruni-store";
pub const DEFAULT_DB_VERSION: u32 = 1;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "DATARUNI_DATA_DIR";

/// Which database and container a value lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataruniConfig {
    pub db_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
}

impl DataruniConfig {
    pub fn new(db_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            db_version: None,
            store_name: None,
        }
    }

    pub fn with_version(mut self, db_version: u32) -> Self {
        self.db_version = Some(db_version);
        self
    }

    pub fn with_store(mut self, store_name: impl Into<String>) -> Self {
        self.store_name = Some(store_name.into());
        self
    }

    /// Fill in defaults. A zero version or empty store name counts as unset.
    pub fn resolve(&self) -> ResolvedConfig {
        let db_version = match self.db_version {
            Some(v) if v > 0 => v,
            _ => DEFAULT_DB_VERSION,
        };
        let store_name = match self.store_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => DEFAULT_STORE_NAME.to_string(),
        };

        ResolvedConfig {
            db_name: self.db_name.clone(),
            db_version,
            store_name,
        }
    }
}

/// Configuration with defaults applied. Equality decides handle reuse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedConfig {
    pub db_name: String,
    pub db_version: u32,
    pub store_name: String,
}

/// Process-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the database files
    pub data_dir: PathBuf,
}

impl Settings {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            return PathBuf::from(dir);
        }

        dirs::data_local_dir()
            .map(|d| d.join("Dataruni"))
            .unwrap_or_else(|| PathBuf::from(".dataruni"))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

// Simple dirs implementation for common directories
mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let resolved = DataruniConfig::new("app").resolve();
        assert_eq!(resolved.db_name, "app");
        assert_eq!(resolved.db_version, DEFAULT_DB_VERSION);
        assert_eq!(resolved.store_name, DEFAULT_STORE_NAME);
    }

    #[test]
    fn test_falsy_values_use_defaults() {
        let config = DataruniConfig::new("app").with_version(0).with_store("");
        assert_eq!(config.resolve(), DataruniConfig::new("app").resolve());
    }

    #[test]
    fn test_explicit_values() {
        let resolved = DataruniConfig::new("app")
            .with_version(3)
            .with_store("prefs")
            .resolve();
        assert_eq!(resolved.db_version, 3);
        assert_eq!(resolved.store_name, "prefs");
    }

    #[test]
    fn test_deserialize_camel_case() {
        let config: DataruniConfig =
            serde_json::from_str(r#"{"dbName":"app","storeName":"prefs"}"#).unwrap();
        assert_eq!(config.db_name, "app");
        assert_eq!(config.db_version, None);
        assert_eq!(config.store_name.as_deref(), Some("prefs"));
    }
}
