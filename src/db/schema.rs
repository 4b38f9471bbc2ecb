//! Store declarations and the ordered list of schema versions.
//!
//! Every version is a plain descriptor: the indices it introduces and an
//! upgrade step that runs inside the migration transaction. The descriptors
//! know nothing about how they are applied; `migrations::MigrationManager`
//! walks them one version at a time.
//!
//! ## Version History
//!
//! | Version | Change |
//! |---------|--------|
//! | 1 | Base stores, single-column indices, `Default` category seed |
//! | 2 | `archived` status support, `[status+due_at]` and `[category_id+status]` indices |
//! | 3 | Recurrence fields, explicitly backfilled as NULL |
//! | 4 | Checklist item index table, rebuilt from every task carrying a checklist |
//!
//! Upgrade steps never drop or truncate data and tolerate being re-run on a
//! store that already has their changes.

use super::categories::{DEFAULT_CATEGORY_COLOR, DEFAULT_CATEGORY_NAME};
use super::error::DbResult;
use super::tasks::{with_item_ids, write_checklist_index};
use crate::libs::task::ChecklistItem;
use rusqlite::{params, Connection, Transaction};
use std::fmt::{self, Display};

/// The named record stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreName {
    Tasks,
    Categories,
    Settings,
}

impl StoreName {
    pub const ALL: [StoreName; 3] = [StoreName::Tasks, StoreName::Categories, StoreName::Settings];

    pub fn table(&self) -> &'static str {
        match self {
            StoreName::Tasks => "tasks",
            StoreName::Categories => "categories",
            StoreName::Settings => "settings",
        }
    }
}

impl Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// A queryable attribute (single or compound) of a table.
#[derive(Debug)]
pub struct IndexSpec {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [&'static str],
}

impl IndexSpec {
    pub fn create_sql(&self) -> String {
        format!("CREATE INDEX IF NOT EXISTS {} ON {} ({})", self.name, self.table, self.columns.join(", "))
    }

    /// Query that can only be planned through this index.
    pub fn probe_sql(&self) -> String {
        let columns = self.columns.join(", ");
        format!(
            "SELECT COUNT(*) FROM (SELECT {} FROM {} INDEXED BY {} ORDER BY {})",
            columns, self.table, self.name, columns
        )
    }
}

/// One entry of the schema history.
pub struct SchemaVersion {
    pub version: u32,
    pub name: &'static str,
    pub indices: &'static [IndexSpec],
    pub upgrade: fn(&Transaction) -> DbResult<()>,
}

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT NOT NULL PRIMARY KEY,
    title TEXT NOT NULL,
    due_at INTEGER,
    duration_min INTEGER,
    category_id TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    checklist TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS categories (
    id TEXT NOT NULL PRIMARY KEY,
    name TEXT NOT NULL,
    color TEXT NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS settings (
    key TEXT NOT NULL PRIMARY KEY,
    value TEXT NOT NULL
);";

const STATUS_TRIGGERS_V2: &str = "
CREATE TRIGGER IF NOT EXISTS tasks_status_insert BEFORE INSERT ON tasks
WHEN NEW.status NOT IN ('pending', 'done', 'archived')
BEGIN
    SELECT RAISE(ABORT, 'invalid task status');
END;
CREATE TRIGGER IF NOT EXISTS tasks_status_update BEFORE UPDATE OF status ON tasks
WHEN NEW.status NOT IN ('pending', 'done', 'archived')
BEGIN
    SELECT RAISE(ABORT, 'invalid task status');
END;";

const CHECKLIST_ITEMS_V4: &str = "
CREATE TABLE IF NOT EXISTS checklist_items (
    task_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    text TEXT NOT NULL,
    checked INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (task_id, item_id)
)";

/// Columns added by v3, all nullable.
const RECURRENCE_COLUMNS: [(&str, &str); 4] = [
    ("repeat_rule", "TEXT"),
    ("repeat_parent_id", "TEXT"),
    ("repeat_count", "INTEGER"),
    ("repeat_until", "INTEGER"),
];

pub const SCHEMA_VERSIONS: &[SchemaVersion] = &[
    SchemaVersion {
        version: 1,
        name: "baseline_stores",
        indices: &[
            IndexSpec { name: "idx_tasks_status", table: "tasks", columns: &["status"] },
            IndexSpec { name: "idx_tasks_due_at", table: "tasks", columns: &["due_at"] },
            IndexSpec { name: "idx_tasks_category", table: "tasks", columns: &["category_id"] },
            IndexSpec { name: "idx_categories_name", table: "categories", columns: &["name"] },
            IndexSpec { name: "idx_categories_order", table: "categories", columns: &["sort_order"] },
        ],
        upgrade: create_base_stores,
    },
    SchemaVersion {
        version: 2,
        name: "archived_status_and_compound_indices",
        indices: &[
            IndexSpec { name: "idx_tasks_status_due", table: "tasks", columns: &["status", "due_at"] },
            IndexSpec { name: "idx_tasks_category_status", table: "tasks", columns: &["category_id", "status"] },
        ],
        upgrade: support_archived_status,
    },
    SchemaVersion {
        version: 3,
        name: "recurrence_fields",
        indices: &[IndexSpec { name: "idx_tasks_repeat_parent", table: "tasks", columns: &["repeat_parent_id"] }],
        upgrade: add_recurrence_fields,
    },
    SchemaVersion {
        version: 4,
        name: "checklist_item_index",
        indices: &[IndexSpec { name: "idx_checklist_open", table: "checklist_items", columns: &["checked", "task_id"] }],
        upgrade: reindex_checklists,
    },
];

pub fn latest_version() -> u32 {
    SCHEMA_VERSIONS.last().map(|v| v.version).unwrap_or(0)
}

pub fn find_version(version: u32) -> Option<&'static SchemaVersion> {
    SCHEMA_VERSIONS.iter().find(|v| v.version == version)
}

/// Indices that exist once the store reached `version`.
pub fn indices_up_to(version: u32) -> impl Iterator<Item = &'static IndexSpec> {
    SCHEMA_VERSIONS.iter().filter(move |v| v.version <= version).flat_map(|v| v.indices.iter())
}

fn create_base_stores(tx: &Transaction) -> DbResult<()> {
    tx.execute_batch(SCHEMA_V1)?;

    // A brand-new store starts with the protected category.
    let categories: i64 = tx.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;
    if categories == 0 {
        tx.execute(
            "INSERT INTO categories (id, name, color, sort_order) VALUES (?1, ?2, ?3, 0)",
            params![uuid::Uuid::new_v4().to_string(), DEFAULT_CATEGORY_NAME, DEFAULT_CATEGORY_COLOR],
        )?;
    }
    Ok(())
}

fn support_archived_status(tx: &Transaction) -> DbResult<()> {
    tx.execute_batch(STATUS_TRIGGERS_V2)?;
    Ok(())
}

fn add_recurrence_fields(tx: &Transaction) -> DbResult<()> {
    for (column, sql_type) in RECURRENCE_COLUMNS {
        if column_exists(tx, "tasks", column)? {
            continue;
        }
        tx.execute(&format!("ALTER TABLE tasks ADD COLUMN {} {}", column, sql_type), [])?;
        // Existing rows get a concrete NULL rather than relying on the column default.
        tx.execute(&format!("UPDATE tasks SET {} = NULL", column), [])?;
    }
    Ok(())
}

fn reindex_checklists(tx: &Transaction) -> DbResult<()> {
    tx.execute(CHECKLIST_ITEMS_V4, [])?;

    let rows: Vec<(String, String)> = {
        let mut stmt = tx.prepare("SELECT id, checklist FROM tasks WHERE checklist <> '[]'")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    for (task_id, raw) in rows {
        let items = with_item_ids(serde_json::from_str::<Vec<ChecklistItem>>(&raw)?);
        tx.execute(
            "UPDATE tasks SET checklist = ?2 WHERE id = ?1",
            params![task_id, serde_json::to_string(&items)?],
        )?;
        write_checklist_index(tx, &task_id, &items)?;
    }
    Ok(())
}

pub(crate) fn column_exists(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
