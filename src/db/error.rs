//! Error types of the data layer.
//!
//! Expected conditions (missing ids, refused deletions) are reported through
//! return values by the operations themselves; the variants here cover engine
//! failures, constraint violations on write, and bad input.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("a category named '{0}' already exists")]
    DuplicateCategory(String),

    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("could not acquire lock '{0}'")]
    LockUnavailable(String),

    #[error("migration to v{version} failed: {message}")]
    Migration { version: u32, message: String },

    #[error("a transaction must name at least one store")]
    NoStores,
}

impl DbError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        DbError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Failure to open the store.
///
/// Returned as a value so front ends can render a degraded state instead of
/// aborting.
#[derive(Debug, Error)]
pub enum StoreOpenError {
    #[error("cannot prepare data directory for {path}: {source}")]
    Directory { path: PathBuf, source: std::io::Error },

    #[error("cannot open database at {path}: {source}")]
    Access { path: PathBuf, source: rusqlite::Error },

    #[error("cannot configure database connection: {0}")]
    Pragmas(rusqlite::Error),

    #[error("cannot upgrade database schema: {0}")]
    Migration(#[from] DbError),

    #[error("cannot read configuration: {0}")]
    Config(String),
}
