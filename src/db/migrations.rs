//! Schema version walker and migration history.
//!
//! The store's schema version is SQLite's `user_version`. Opening a store
//! walks it forward through [`SCHEMA_VERSIONS`] one version at a time; each
//! step runs in its own transaction that applies the upgrade, creates the
//! indices declared up to that version, bumps `user_version` and writes a
//! history entry.
//!
//! ## History
//!
//! Every attempted step, successful or not, leaves a record in `settings`
//! under `__migration:<version>:<timestamp>:<suffix>`. A failed step is rolled
//! back first and recorded afterwards, so the failure entry survives.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasknest::db::migrations::{get_db_version, init_with_migrations};
//! use rusqlite::Connection;
//!
//! let mut conn = Connection::open("tasknest.db")?;
//! init_with_migrations(&mut conn)?;
//! let version = get_db_version(&conn)?;
//! # Ok::<(), tasknest::db::error::DbError>(())
//! ```

use super::db::Db;
use super::error::{DbError, DbResult};
use super::schema::{indices_up_to, latest_version, SchemaVersion, SCHEMA_VERSIONS};
use super::settings::{Settings, MIGRATION_PREFIX};
use crate::libs::formatter::now_millis;
use crate::libs::messages::Message;
use crate::{msg_debug, msg_error, msg_warning};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One entry of the migration history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    pub version: u32,
    pub timestamp: i64,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Applies schema versions in order.
///
/// The manager holds no state beyond the version list; any number of them
/// can exist, but only one connection should migrate a given file at a time
/// (each step takes an `IMMEDIATE` transaction, so a second writer waits on
/// the busy timeout).
pub struct MigrationManager {
    versions: &'static [SchemaVersion],
}

impl Default for MigrationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationManager {
    pub fn new() -> Self {
        Self {
            versions: SCHEMA_VERSIONS,
        }
    }

    pub fn latest_version(&self) -> u32 {
        self.versions.last().map(|v| v.version).unwrap_or(0)
    }

    /// Reads `user_version`. A fresh file reports 0.
    pub fn get_current_version(&self, conn: &Connection) -> DbResult<u32> {
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(u32::try_from(version).unwrap_or(0))
    }

    /// Brings the store to the latest version.
    ///
    /// Stops at the first failing step and returns
    /// [`DbError::Migration`]; versions applied before it stay applied.
    pub fn run_migrations(&self, conn: &mut Connection) -> DbResult<()> {
        let current_version = self.get_current_version(conn)?;
        let latest = self.latest_version();

        if current_version > latest {
            msg_warning!(Message::SchemaNewerThanKnown(current_version, latest));
            return Ok(());
        }

        let pending: Vec<&SchemaVersion> = self.versions.iter().filter(|v| v.version > current_version).collect();
        if pending.is_empty() {
            msg_debug!(Message::DatabaseUpToDate(current_version));
            return Ok(());
        }

        msg_debug!(Message::MigrationsFound(pending.len()));
        for version in pending {
            self.apply(conn, version)?;
        }
        msg_debug!(Message::AllMigrationsCompleted(latest));
        Ok(())
    }

    /// Walks forward to `target` (default: latest).
    ///
    /// Returns `false` without changing anything for a target below the
    /// current version or one that is not a known version, and `false`
    /// after rolling back the first step that fails.
    pub fn migrate_database(&self, conn: &mut Connection, target: Option<u32>) -> DbResult<bool> {
        let current_version = self.get_current_version(conn)?;
        let target = target.unwrap_or_else(|| self.latest_version());

        if target < current_version {
            msg_warning!(Message::MigrationDowngradeRefused(current_version, target));
            return Ok(false);
        }
        if target > self.latest_version() || (target > 0 && !self.versions.iter().any(|v| v.version == target)) {
            msg_warning!(Message::MigrationUnknownTarget(target));
            return Ok(false);
        }

        for version in self
            .versions
            .iter()
            .filter(|v| v.version > current_version && v.version <= target)
        {
            if self.apply(conn, version).is_err() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn apply(&self, conn: &mut Connection, version: &SchemaVersion) -> DbResult<()> {
        msg_debug!(Message::RunningMigration(version.version, version.name.to_string()));

        match apply_step(conn, version) {
            Ok(()) => {
                msg_debug!(Message::MigrationCompleted(version.version));
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                msg_error!(Message::MigrationFailed(version.version, message.clone()));
                if let Err(record_error) = record_migration(conn, version.version, false, Some(&message)) {
                    msg_debug!(Message::MigrationRecordFailed(version.version, record_error.to_string()));
                }
                Err(DbError::Migration {
                    version: version.version,
                    message,
                })
            }
        }
    }

    /// History entries ordered by version, then by time.
    pub fn get_migration_history(&self, conn: &Connection) -> DbResult<Vec<MigrationRecord>> {
        get_migration_history(conn)
    }
}

fn apply_step(conn: &mut Connection, version: &SchemaVersion) -> DbResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    (version.upgrade)(&tx)?;
    for index in indices_up_to(version.version) {
        tx.execute(&index.create_sql(), [])?;
    }
    tx.pragma_update(None, "user_version", version.version)?;
    record_migration(&tx, version.version, true, None)?;
    tx.commit()?;
    Ok(())
}

/// Persists one history entry.
pub fn record_migration(conn: &Connection, version: u32, success: bool, error: Option<&str>) -> DbResult<()> {
    let timestamp = now_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let key = format!("{}{:06}:{:013}:{}", MIGRATION_PREFIX, version, timestamp, &suffix[..8]);
    let value = json!({
        "version": version,
        "timestamp": timestamp,
        "success": success,
        "error": error,
    });
    Settings::new(conn).put(&key, &value)
}

pub fn get_migration_history(conn: &Connection) -> DbResult<Vec<MigrationRecord>> {
    let mut history = Vec::new();
    for setting in Settings::new(conn).by_prefix(MIGRATION_PREFIX)? {
        history.push(serde_json::from_value::<MigrationRecord>(setting.value)?);
    }
    history.sort_by_key(|record| (record.version, record.timestamp));
    Ok(history)
}

/// Applies every pending version to `conn`.
pub fn init_with_migrations(conn: &mut Connection) -> DbResult<()> {
    MigrationManager::new().run_migrations(conn)
}

pub fn get_db_version(conn: &Connection) -> DbResult<u32> {
    MigrationManager::new().get_current_version(conn)
}

pub fn needs_migration(conn: &Connection) -> DbResult<bool> {
    Ok(get_db_version(conn)? < latest_version())
}

impl Db {
    /// The store's reported schema version.
    pub fn version(&self) -> DbResult<u32> {
        get_db_version(&self.conn)
    }

    pub fn migrate(&mut self, target: Option<u32>) -> DbResult<bool> {
        MigrationManager::new().migrate_database(&mut self.conn, target)
    }

    pub fn migration_history(&self) -> DbResult<Vec<MigrationRecord>> {
        get_migration_history(&self.conn)
    }
}
