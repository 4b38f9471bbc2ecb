//! Transactions, batch operations and the advisory lock.
//!
//! ## Atomic execution
//!
//! [`Db::transaction`] runs a closure inside one `IMMEDIATE` SQLite
//! transaction. The closure's error aborts the transaction: every write it
//! performed is discarded and the error reaches the caller unchanged.
//! [`Db::read_transaction`] gives a consistent multi-store read with the
//! connection switched to `query_only` for its duration.
//!
//! Single operations that touch several tables use [`atomic`], which opens
//! a transaction when the connection is idle and a savepoint when the caller
//! already holds one. Operations therefore compose inside a caller's
//! transaction without committing it early.
//!
//! ## Advisory lock
//!
//! Sequences that must not run twice concurrently (recurrence expansion for
//! one task) take an [`AdvisoryLock`]: a sentinel row under
//! `__lock:<name>` in `settings`. Several processes can share the database
//! file, so sentinels older than the configured staleness are reclaimed.
//! The guard deletes its own sentinel on drop, whether the protected work
//! succeeded, failed or unwound.

use super::db::Db;
use super::error::{DbError, DbResult};
use super::schema::StoreName;
use super::settings::{Settings, LOCK_PREFIX};
use super::tasks::Tasks;
use crate::libs::config::LockConfig;
use crate::libs::formatter::now_millis;
use crate::libs::messages::Message;
use crate::libs::task::TaskPatch;
use crate::{msg_debug, msg_warning};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use serde_json::{json, Value};
use std::thread;

impl Db {
    /// Runs `f` atomically over `stores`.
    ///
    /// `E` is the caller's error type; any `Err` returned by `f` rolls back
    /// every write made inside it.
    ///
    /// ```rust,no_run
    /// use tasknest::db::{db::Db, error::DbError, schema::StoreName};
    ///
    /// let mut db = Db::open_in_memory()?;
    /// db.transaction(&[StoreName::Tasks, StoreName::Categories], |tx| {
    ///     tx.execute("UPDATE tasks SET category_id = NULL", [])?;
    ///     Ok::<_, DbError>(())
    /// })?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn transaction<T, E, F>(&mut self, stores: &[StoreName], f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction) -> Result<T, E>,
        E: From<DbError>,
    {
        if stores.is_empty() {
            return Err(DbError::NoStores.into());
        }
        msg_debug!(Message::TransactionStarted(store_list(stores)));

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| E::from(DbError::from(e)))?;
        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(|e| E::from(DbError::from(e)))?;
                Ok(value)
            }
            Err(e) => {
                // Dropping the transaction rolls it back.
                drop(tx);
                msg_debug!(Message::TransactionRolledBack(store_list(stores)));
                Err(e)
            }
        }
    }

    /// Consistent read across `stores`. Writes attempted inside `f` fail.
    pub fn read_transaction<T, E, F>(&mut self, stores: &[StoreName], f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction) -> Result<T, E>,
        E: From<DbError>,
    {
        if stores.is_empty() {
            return Err(DbError::NoStores.into());
        }

        self.conn
            .pragma_update(None, "query_only", true)
            .map_err(|e| E::from(DbError::from(e)))?;
        let result = run_read(&mut self.conn, f);
        let reset = self.conn.pragma_update(None, "query_only", false);

        let value = result?;
        reset.map_err(|e| E::from(DbError::from(e)))?;
        Ok(value)
    }

    /// Applies `patch` to every listed task that exists.
    ///
    /// Unknown ids are skipped; the count of tasks actually updated is
    /// returned. All updates commit together.
    pub fn batch_update_tasks(&mut self, ids: &[String], patch: &TaskPatch) -> DbResult<usize> {
        self.transaction(&[StoreName::Tasks], |tx| {
            let tasks = Tasks::new(tx);
            let mut affected = 0;
            for id in ids {
                if tasks.update(id, patch)? {
                    affected += 1;
                }
            }
            Ok(affected)
        })
    }

    /// Deletes every listed task that exists and returns how many were removed.
    pub fn batch_delete_tasks(&mut self, ids: &[String]) -> DbResult<usize> {
        self.transaction(&[StoreName::Tasks], |tx| {
            let tasks = Tasks::new(tx);
            let mut affected = 0;
            for id in ids {
                if tasks.delete(id)? {
                    affected += 1;
                }
            }
            Ok(affected)
        })
    }

    /// Runs `f` while holding the advisory lock `name`.
    pub fn with_lock<T, E, F>(&self, name: &str, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<DbError>,
    {
        with_lock(&self.conn, &self.lock, name, f)
    }
}

fn run_read<T, E, F>(conn: &mut Connection, f: F) -> Result<T, E>
where
    F: FnOnce(&Transaction) -> Result<T, E>,
    E: From<DbError>,
{
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Deferred)
        .map_err(|e| E::from(DbError::from(e)))?;
    let value = f(&tx)?;
    tx.commit().map_err(|e| E::from(DbError::from(e)))?;
    Ok(value)
}

fn store_list(stores: &[StoreName]) -> String {
    stores.iter().map(|s| s.table()).collect::<Vec<_>>().join(", ")
}

/// Runs `f` all-or-nothing on `conn`.
///
/// Opens a transaction on an idle connection, or a savepoint inside the
/// caller's transaction.
pub(crate) fn atomic<T, E, F>(conn: &Connection, f: F) -> Result<T, E>
where
    F: FnOnce(&Connection) -> Result<T, E>,
    E: From<rusqlite::Error>,
{
    if conn.is_autocommit() {
        let tx = conn.unchecked_transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        return Ok(value);
    }

    conn.execute_batch("SAVEPOINT atomic_step")?;
    match f(conn) {
        Ok(value) => {
            conn.execute_batch("RELEASE atomic_step")?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = conn.execute_batch("ROLLBACK TO atomic_step; RELEASE atomic_step") {
                msg_debug!(Message::SavepointRollbackFailed(rollback.to_string()));
            }
            Err(e)
        }
    }
}

/// Holds the advisory lock for `name` until dropped.
#[derive(Debug)]
pub struct AdvisoryLock<'c> {
    conn: &'c Connection,
    key: String,
    token: String,
}

impl<'c> AdvisoryLock<'c> {
    /// Tries to take the lock, at most `config.attempts` times.
    ///
    /// Must be called outside an open transaction so the sentinel is
    /// visible to other connections.
    pub fn acquire(conn: &'c Connection, config: &LockConfig, name: &str) -> DbResult<Self> {
        let key = format!("{}{}", LOCK_PREFIX, name);
        let settings = Settings::new(conn);
        let attempts = config.attempts.max(1);

        for attempt in 1..=attempts {
            if let Some(token) = insert_sentinel(&settings, &key)? {
                return Ok(Self { conn, key, token });
            }

            if let Some(held) = settings.get(&key)? {
                let acquired_at = held.value.get("acquiredAt").and_then(Value::as_i64).unwrap_or(0);
                if now_millis() - acquired_at >= config.stale_after_ms() {
                    conn.execute(
                        "DELETE FROM settings WHERE key = ?1 AND value = ?2",
                        params![key, serde_json::to_string(&held.value)?],
                    )?;
                    msg_warning!(Message::StaleLockReclaimed(name.to_string()));
                    // Another process may win the freed key; that counts as this attempt.
                    if let Some(token) = insert_sentinel(&settings, &key)? {
                        return Ok(Self { conn, key, token });
                    }
                }
            }

            if attempt < attempts {
                msg_debug!(Message::LockRetry(name.to_string(), attempt));
                thread::sleep(config.backoff());
            }
        }

        Err(DbError::LockUnavailable(name.to_string()))
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Inserts a fresh sentinel under `key`; returns its serialized form when
/// the key was free.
fn insert_sentinel(settings: &Settings, key: &str) -> DbResult<Option<String>> {
    let sentinel = json!({
        "acquiredAt": now_millis(),
        "pid": std::process::id(),
        "token": uuid::Uuid::new_v4().to_string(),
    });
    if settings.insert_if_absent(key, &sentinel)? {
        Ok(Some(serde_json::to_string(&sentinel)?))
    } else {
        Ok(None)
    }
}

impl Drop for AdvisoryLock<'_> {
    fn drop(&mut self) {
        let released = self.conn.execute(
            "DELETE FROM settings WHERE key = ?1 AND value = ?2",
            params![self.key, self.token],
        );
        if let Err(e) = released {
            msg_debug!(Message::LockReleaseFailed(self.key.clone(), e.to_string()));
        }
    }
}

/// Runs `f` while holding the advisory lock `name` on `conn`.
pub fn with_lock<T, E, F>(conn: &Connection, config: &LockConfig, name: &str, f: F) -> Result<T, E>
where
    F: FnOnce(&Connection) -> Result<T, E>,
    E: From<DbError>,
{
    let _guard = AdvisoryLock::acquire(conn, config, name)?;
    f(conn)
}
