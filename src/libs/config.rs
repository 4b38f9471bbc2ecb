//! Application configuration.
//!
//! Settings that describe *how the program runs* (where the database lives,
//! lock timing, export location) are kept in `config.json` inside the
//! platform data directory. User preferences that belong to the data itself
//! live in the `settings` store instead.
//!
//! ## File Location
//!
//! - **Windows**: `%LOCALAPPDATA%\tasknest\tasknest\config.json`
//! - **macOS**: `~/Library/Application Support/tasknest/tasknest/config.json`
//! - **Linux**: `~/.local/share/tasknest/tasknest/config.json`
//!
//! The `TASKNEST_DB` environment variable overrides the database path.
//!
//! ```rust,no_run
//! use tasknest::libs::config::Config;
//!
//! let config = Config::read()?;
//! let db_path = config.database_path()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use super::data_storage::DataStorage;
use crate::db::db::DB_FILE_NAME;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Environment variable overriding the database location.
pub const DB_PATH_ENV: &str = "TASKNEST_DB";

/// Timing of the advisory lock used to serialize recurrence expansion.
///
/// Several processes may open the same database file, so a lock left behind
/// by a crashed process is reclaimed once it is older than `stale_after_secs`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LockConfig {
    /// Acquisition attempts before giving up.
    pub attempts: u32,
    /// Fixed pause between attempts, in milliseconds.
    pub backoff_ms: u64,
    /// Age after which a held lock is considered abandoned, in seconds.
    pub stale_after_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        LockConfig {
            attempts: 5,
            backoff_ms: 50,
            stale_after_secs: 30,
        }
    }
}

impl LockConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn stale_after_ms(&self) -> i64 {
        (self.stale_after_secs as i64).saturating_mul(1000)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Config {
    /// Database file; defaults to `tasknest.db` in the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub lock: LockConfig,
    /// Directory for generated export files; defaults to the working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,
}

impl Config {
    /// Reads `config.json` from the data directory, falling back to defaults
    /// when the file does not exist.
    pub fn read() -> Result<Config> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        Self::read_from(&config_file_path)
    }

    pub fn read_from(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let config_str = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_str).with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        self.save_to(&config_file_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Effective database path: `TASKNEST_DB`, then `database`, then the
    /// default file in the data directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Ok(path) = env::var(DB_PATH_ENV) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => Ok(DataStorage::new().get_path(DB_FILE_NAME)?),
        }
    }
}
