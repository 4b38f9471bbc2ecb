//! Snapshots, restore and health checks.
//!
//! A snapshot is every record of the three stores plus the schema version it
//! was taken at. Restoring preserves ids; it is the counterpart of a backup,
//! not of a file import (see `libs::export` for that).

use super::categories::{Categories, Category, DEFAULT_CATEGORY_NAME};
use super::db::Db;
use super::error::DbResult;
use super::migrations::get_db_version;
use super::schema::{indices_up_to, latest_version, StoreName};
use super::settings::{Setting, Settings, LOCK_PREFIX, MIGRATION_PREFIX};
use super::tasks::Tasks;
use crate::libs::formatter::now_millis;
use crate::libs::messages::Message;
use crate::libs::task::Task;
use crate::{msg_debug, msg_error, msg_warning};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbSnapshot {
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
    pub settings: Vec<Setting>,
    pub version: u32,
    pub timestamp: i64,
}

/// Takes a consistent snapshot of all stores. Lock sentinels are left out.
pub fn backup_database(db: &mut Db) -> DbResult<DbSnapshot> {
    db.read_transaction(&StoreName::ALL, |tx| {
        let settings = Settings::new(tx)
            .all()?
            .into_iter()
            .filter(|s| !s.key.starts_with(LOCK_PREFIX))
            .collect();

        Ok(DbSnapshot {
            tasks: Tasks::new(tx).all()?,
            categories: Categories::new(tx).all()?,
            settings,
            version: get_db_version(tx)?,
            timestamp: now_millis(),
        })
    })
}

/// Replaces the content of every store with `snapshot`.
///
/// A snapshot from a newer schema than this build knows is refused. One
/// from a newer schema than the live store is applied after migrating the
/// store forward. Clearing and reinsertion happen in one transaction, so a
/// failure leaves the previous content in place. Returns `false` on any
/// refusal or failure.
pub fn restore_database(db: &mut Db, snapshot: &DbSnapshot) -> DbResult<bool> {
    let latest = latest_version();
    if snapshot.version > latest {
        msg_warning!(Message::RestoreRefusedNewer(snapshot.version, latest));
        return Ok(false);
    }

    if snapshot.version > db.version()? && !db.migrate(Some(snapshot.version))? {
        msg_error!(Message::RestoreFailed(format!(
            "could not migrate the store to v{}",
            snapshot.version
        )));
        return Ok(false);
    }

    let result: DbResult<()> = db.transaction(&StoreName::ALL, |tx| {
        let tasks = Tasks::new(tx);
        let categories = Categories::new(tx);
        let settings = Settings::new(tx);

        tasks.clear()?;
        categories.clear()?;
        settings.clear()?;

        for category in &snapshot.categories {
            categories.insert(category)?;
        }
        for task in &snapshot.tasks {
            tasks.insert(task)?;
        }
        // The live migration history survives `clear`; the snapshot's own
        // entries describe another store's upgrades and are not copied.
        let restorable = snapshot
            .settings
            .iter()
            .filter(|s| !s.key.starts_with(LOCK_PREFIX) && !s.key.starts_with(MIGRATION_PREFIX));
        for setting in restorable {
            settings.put(&setting.key, &setting.value)?;
        }
        Ok(())
    });

    match result {
        Ok(()) => {
            msg_debug!(Message::RestoreCompleted(
                snapshot.tasks.len(),
                snapshot.categories.len(),
                snapshot.settings.len()
            ));
            Ok(true)
        }
        Err(e) => {
            msg_error!(Message::RestoreFailed(e.to_string()));
            Ok(false)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub tasks: i64,
    pub categories: i64,
    pub settings: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub version: u32,
    pub latest_version: u32,
    pub counts: StoreCounts,
    pub issues: Vec<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Inspects the store. Never fails: every problem found, including errors
/// raised while looking, is reported in `issues`.
pub fn check_database_health(db: &Db) -> HealthReport {
    let conn = &db.conn;
    let mut issues = Vec::new();

    let version = get_db_version(conn).unwrap_or_else(|e| {
        issues.push(format!("cannot read schema version: {}", e));
        0
    });
    let latest = latest_version();
    if version < latest {
        issues.push(format!("schema version v{} is behind latest v{}", version, latest));
    }

    let mut counts = StoreCounts::default();
    for store in StoreName::ALL {
        let count = match store {
            StoreName::Tasks => Tasks::new(conn).count(),
            StoreName::Categories => Categories::new(conn).count(),
            StoreName::Settings => Settings::new(conn).count(),
        };
        match (store, count) {
            (StoreName::Tasks, Ok(n)) => counts.tasks = n,
            (StoreName::Categories, Ok(n)) => counts.categories = n,
            (StoreName::Settings, Ok(n)) => counts.settings = n,
            (store, Err(e)) => issues.push(format!("{} store unreadable: {}", store, e)),
        }
    }

    match conn.query_row("PRAGMA integrity_check", [], |row| row.get::<_, String>(0)) {
        Ok(result) if result == "ok" => {}
        Ok(result) => issues.push(format!("integrity check failed: {}", result)),
        Err(e) => issues.push(format!("integrity check could not run: {}", e)),
    }

    for index in indices_up_to(version) {
        if let Err(e) = conn.query_row(&index.probe_sql(), [], |row| row.get::<_, i64>(0)) {
            issues.push(format!("index {} on {} unusable: {}", index.name, index.table, e));
        }
    }

    if version > 0 {
        if counts.categories == 0 {
            issues.push("no categories: the Default category is missing".to_string());
        } else {
            match Categories::new(conn).get_by_name(DEFAULT_CATEGORY_NAME) {
                Ok(Some(_)) => {}
                Ok(None) => issues.push("the Default category is missing".to_string()),
                Err(e) => issues.push(format!("cannot look up the Default category: {}", e)),
            }
        }

        match Settings::new(conn).by_prefix(LOCK_PREFIX) {
            Ok(locks) => {
                let now = now_millis();
                for lock in locks {
                    let acquired_at = lock.value.get("acquiredAt").and_then(Value::as_i64).unwrap_or(0);
                    if now - acquired_at >= db.lock.stale_after_ms() {
                        issues.push(format!("stale lock sentinel '{}'", lock.key));
                    }
                }
            }
            Err(e) => issues.push(format!("cannot list lock sentinels: {}", e)),
        }
    }

    HealthReport {
        version,
        latest_version: latest,
        counts,
        issues,
    }
}

impl Db {
    pub fn backup(&mut self) -> DbResult<DbSnapshot> {
        backup_database(self)
    }

    pub fn restore(&mut self, snapshot: &DbSnapshot) -> DbResult<bool> {
        restore_database(self, snapshot)
    }

    pub fn health(&self) -> HealthReport {
        check_database_health(self)
    }
}
