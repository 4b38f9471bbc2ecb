//! Database handle and store lifecycle.
//!
//! [`Db`] owns one SQLite connection with the schema brought up to date.
//! [`StoreHandle`] wraps a `Db` for front ends that open and close the store
//! over their own lifetime.

use super::categories::Categories;
use super::error::StoreOpenError;
use super::migrations::MigrationManager;
use super::settings::Settings;
use super::tasks::Tasks;
use crate::libs::config::{Config, LockConfig};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

pub const DB_FILE_NAME: &str = "tasknest.db";

pub struct Db {
    pub conn: Connection,
    pub(crate) lock: LockConfig,
}

impl Db {
    /// Opens the database configured for this installation.
    pub fn new() -> Result<Db, StoreOpenError> {
        let config = Config::read().map_err(|e| StoreOpenError::Config(e.to_string()))?;
        let path = config.database_path().map_err(|e| StoreOpenError::Config(e.to_string()))?;
        Ok(Db::open(&path)?.with_lock_config(config.lock))
    }

    /// Opens (creating when missing) the database at `path` and applies
    /// every pending schema version.
    pub fn open(path: &Path) -> Result<Db, StoreOpenError> {
        let mut db = Db::open_without_migrations(path)?;
        MigrationManager::new().run_migrations(&mut db.conn)?;
        Ok(db)
    }

    /// Opens the database without touching its schema.
    pub fn open_without_migrations(path: &Path) -> Result<Db, StoreOpenError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreOpenError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(|source| StoreOpenError::Access {
            path: path.to_path_buf(),
            source,
        })?;
        set_pragmas(&conn, true)?;

        Ok(Db {
            conn,
            lock: LockConfig::default(),
        })
    }

    /// Private in-memory store, fully migrated.
    pub fn open_in_memory() -> Result<Db, StoreOpenError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreOpenError::Access {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        set_pragmas(&conn, false)?;

        let mut db = Db {
            conn,
            lock: LockConfig::default(),
        };
        MigrationManager::new().run_migrations(&mut db.conn)?;
        Ok(db)
    }

    pub fn with_lock_config(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }

    pub fn lock_config(&self) -> &LockConfig {
        &self.lock
    }

    pub fn tasks(&self) -> Tasks<'_> {
        Tasks::new(&self.conn)
    }

    pub fn categories(&self) -> Categories<'_> {
        Categories::new(&self.conn)
    }

    pub fn settings(&self) -> Settings<'_> {
        Settings::new(&self.conn)
    }
}

fn set_pragmas(conn: &Connection, file_backed: bool) -> Result<(), StoreOpenError> {
    if file_backed {
        conn.pragma_update(None, "journal_mode", "WAL").map_err(StoreOpenError::Pragmas)?;
    }
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
    .map_err(StoreOpenError::Pragmas)?;
    Ok(())
}

/// Owns the store over an application's lifetime.
///
/// `open` on an open handle returns the existing connection; migrations run
/// once per actual open. `close` drops the connection and is a no-op when
/// already closed.
pub struct StoreHandle {
    path: PathBuf,
    lock: LockConfig,
    db: Option<Db>,
}

impl StoreHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: LockConfig::default(),
            db: None,
        }
    }

    pub fn with_lock_config(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&mut self) -> Result<&mut Db, StoreOpenError> {
        let db = match self.db.take() {
            Some(db) => db,
            None => Db::open(&self.path)?.with_lock_config(self.lock.clone()),
        };
        Ok(self.db.insert(db))
    }

    pub fn is_open(&self) -> bool {
        self.db.is_some()
    }

    /// The open database, if any.
    pub fn db(&mut self) -> Option<&mut Db> {
        self.db.as_mut()
    }

    pub fn close(&mut self) {
        self.db = None;
    }
}
