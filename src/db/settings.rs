//! Key/value settings.
//!
//! Values are arbitrary JSON. Two key prefixes are reserved for
//! bookkeeping written by the data layer itself: migration history entries
//! and advisory lock sentinels. They live in the same table but are hidden
//! from [`Settings::user_settings`] and never exported.

use super::error::DbResult;
use super::transaction::atomic;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MIGRATION_PREFIX: &str = "__migration:";
pub const LOCK_PREFIX: &str = "__lock:";

const UPSERT_SETTING: &str =
    "INSERT INTO settings (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value";
const INSERT_SETTING_IF_ABSENT: &str = "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl Setting {
    pub fn new(key: &str, value: Value) -> Self {
        Self {
            key: key.to_string(),
            value,
        }
    }

    pub fn is_internal(&self) -> bool {
        is_internal_key(&self.key)
    }
}

pub fn is_internal_key(key: &str) -> bool {
    key.starts_with(MIGRATION_PREFIX) || key.starts_with(LOCK_PREFIX)
}

pub struct Settings<'a> {
    conn: &'a Connection,
}

impl<'a> Settings<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, key: &str) -> DbResult<Option<Setting>> {
        self.conn
            .query_row("SELECT key, value FROM settings WHERE key = ?1", params![key], map_setting)
            .optional()
            .map_err(Into::into)
    }

    /// Typed read. A missing key yields `None`.
    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> DbResult<Option<T>> {
        match self.get(key)? {
            Some(setting) => Ok(Some(serde_json::from_value(setting.value)?)),
            None => Ok(None),
        }
    }

    pub fn all(&self) -> DbResult<Vec<Setting>> {
        self.query("SELECT key, value FROM settings ORDER BY key", &[])
    }

    /// Settings excluding the reserved bookkeeping keys.
    pub fn user_settings(&self) -> DbResult<Vec<Setting>> {
        Ok(self.all()?.into_iter().filter(|s| !s.is_internal()).collect())
    }

    pub fn by_prefix(&self, prefix: &str) -> DbResult<Vec<Setting>> {
        let pattern = format!("{}%", prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_"));
        self.query(
            "SELECT key, value FROM settings WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key",
            &[&pattern as &dyn rusqlite::ToSql],
        )
    }

    pub fn put(&self, key: &str, value: &Value) -> DbResult<()> {
        self.conn.execute(UPSERT_SETTING, params![key, serde_json::to_string(value)?])?;
        Ok(())
    }

    /// Writes every pair or none of them.
    pub fn put_many(&self, settings: &[Setting]) -> DbResult<()> {
        atomic(self.conn, |conn| {
            let settings_ops = Settings::new(conn);
            for setting in settings {
                settings_ops.put(&setting.key, &setting.value)?;
            }
            Ok(())
        })
    }

    /// Returns `true` when the key was absent and the value was written.
    pub fn insert_if_absent(&self, key: &str, value: &Value) -> DbResult<bool> {
        let affected = self
            .conn
            .execute(INSERT_SETTING_IF_ABSENT, params![key, serde_json::to_string(value)?])?;
        Ok(affected > 0)
    }

    pub fn delete(&self, key: &str) -> DbResult<bool> {
        let affected = self.conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    }

    pub fn count(&self) -> DbResult<i64> {
        Ok(self.conn.query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))?)
    }

    /// Removes user settings; reserved bookkeeping keys survive.
    pub(crate) fn clear(&self) -> DbResult<()> {
        self.conn.execute(
            "DELETE FROM settings WHERE substr(key, 1, length(?1)) <> ?1 AND substr(key, 1, length(?2)) <> ?2",
            params![MIGRATION_PREFIX, LOCK_PREFIX],
        )?;
        Ok(())
    }

    fn query(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> DbResult<Vec<Setting>> {
        let mut stmt = self.conn.prepare(sql)?;
        let settings = stmt.query_map(args, map_setting)?.collect::<Result<Vec<_>, _>>()?;
        Ok(settings)
    }
}

fn map_setting(row: &Row<'_>) -> rusqlite::Result<Setting> {
    let raw: String = row.get(1)?;
    let value = serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e)))?;
    Ok(Setting { key: row.get(0)?, value })
}
