//! Task operations.
//!
//! `Tasks` borrows a connection, so the same operations run standalone or
//! inside a caller's transaction (a `&Transaction` derefs to `&Connection`).
//! Checklist items are mirrored into `checklist_items` on every write that
//! touches a checklist; that table is the query index for open items.
//!
//! ```rust,no_run
//! use tasknest::db::db::Db;
//! use tasknest::libs::task::{NewTask, TaskFilter, TaskStatus};
//!
//! let db = Db::open_in_memory()?;
//! let task = db.tasks().create(&NewTask::new("Review PR"))?;
//! let pending = db.tasks().fetch(&TaskFilter::Status(TaskStatus::Pending))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use super::error::{DbError, DbResult};
use super::transaction::atomic;
use crate::libs::formatter::now_millis;
use crate::libs::task::{ChecklistItem, NewTask, Task, TaskFilter, TaskPatch, TaskStatus};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;

const TASK_COLUMNS: &str = "id, title, due_at, duration_min, category_id, status, checklist, \
    repeat_rule, repeat_parent_id, repeat_count, repeat_until, created_at, updated_at";
const INSERT_TASK: &str = "INSERT INTO tasks (id, title, due_at, duration_min, category_id, status, checklist, \
    repeat_rule, repeat_parent_id, repeat_count, repeat_until, created_at, updated_at) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";
const UPDATE_TASK: &str = "UPDATE tasks SET title = ?2, due_at = ?3, duration_min = ?4, category_id = ?5, \
    status = ?6, checklist = ?7, repeat_rule = ?8, repeat_until = ?9, updated_at = ?10 WHERE id = ?1";
const DELETE_TASK: &str = "DELETE FROM tasks WHERE id = ?1";
const DELETE_CHECKLIST_ROWS: &str = "DELETE FROM checklist_items WHERE task_id = ?1";
const INSERT_CHECKLIST_ROW: &str =
    "INSERT OR REPLACE INTO checklist_items (task_id, item_id, position, text, checked) VALUES (?1, ?2, ?3, ?4, ?5)";

pub struct Tasks<'a> {
    conn: &'a Connection,
}

impl<'a> Tasks<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, id: &str) -> DbResult<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
        self.conn.query_row(&sql, params![id], map_task).optional().map_err(Into::into)
    }

    pub fn all(&self) -> DbResult<Vec<Task>> {
        self.fetch(&TaskFilter::All)
    }

    pub fn fetch(&self, filter: &TaskFilter) -> DbResult<Vec<Task>> {
        let (clause, params): (String, Vec<rusqlite::types::Value>) = match filter {
            TaskFilter::All => ("ORDER BY created_at, id".to_string(), vec![]),
            TaskFilter::Status(status) => (
                "WHERE status = ?1 ORDER BY due_at IS NULL, due_at, created_at".to_string(),
                vec![status.as_str().to_string().into()],
            ),
            TaskFilter::DueFrom { from, inclusive } => (
                format!("WHERE due_at {} ?1 ORDER BY due_at, created_at", if *inclusive { ">=" } else { ">" }),
                vec![(*from).into()],
            ),
            TaskFilter::StatusDueFrom { status, from, inclusive } => (
                format!(
                    "INDEXED BY idx_tasks_status_due WHERE status = ?1 AND due_at {} ?2 ORDER BY due_at, created_at",
                    if *inclusive { ">=" } else { ">" }
                ),
                vec![status.as_str().to_string().into(), (*from).into()],
            ),
            TaskFilter::Category { category_id, status } => match status {
                Some(status) => (
                    "INDEXED BY idx_tasks_category_status WHERE category_id = ?1 AND status = ?2 ORDER BY created_at".to_string(),
                    vec![category_id.clone().into(), status.as_str().to_string().into()],
                ),
                None => ("WHERE category_id = ?1 ORDER BY created_at".to_string(), vec![category_id.clone().into()]),
            },
            TaskFilter::Chain(root) => (
                "WHERE id = ?1 OR repeat_parent_id = ?1 ORDER BY repeat_count IS NOT NULL, repeat_count, created_at".to_string(),
                vec![root.clone().into()],
            ),
            TaskFilter::OpenChecklist => (
                "WHERE id IN (SELECT task_id FROM checklist_items WHERE checked = 0) ORDER BY created_at".to_string(),
                vec![],
            ),
            TaskFilter::ByIds(ids) => {
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                (
                    format!("WHERE id IN ({}) ORDER BY created_at", vec!["?"; ids.len()].join(", ")),
                    ids.iter().cloned().map(Into::into).collect(),
                )
            }
        };

        let sql = format!("SELECT {} FROM tasks {}", TASK_COLUMNS, clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let task_iter = stmt.query_map(params_from_iter(params.iter()), map_task)?;

        let mut tasks = Vec::new();
        for task in task_iter {
            tasks.push(task?);
        }
        Ok(tasks)
    }

    pub fn count(&self) -> DbResult<i64> {
        Ok(self.conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?)
    }

    /// Creates a task, assigning an id and timestamps when absent.
    pub fn create(&self, new_task: &NewTask) -> DbResult<Task> {
        let now = now_millis();
        let id = new_task.id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        if self.get(&id)?.is_some() {
            return Err(DbError::validation("id", format!("task '{}' already exists", id)));
        }
        let created_at = new_task.created_at.unwrap_or(now);

        let task = Task {
            id,
            title: new_task.title.trim().to_string(),
            due_at: new_task.due_at,
            duration_min: new_task.duration_min,
            category_id: new_task.category_id.clone(),
            status: new_task.status.unwrap_or(TaskStatus::Pending),
            checklist: with_item_ids(new_task.checklist.clone()),
            repeat_rule: new_task.repeat_rule.clone(),
            repeat_parent_id: None,
            repeat_count: None,
            repeat_until: new_task.repeat_until,
            created_at,
            updated_at: new_task.updated_at.unwrap_or(created_at),
        };
        self.insert(&task)?;
        Ok(task)
    }

    /// Writes a complete record as-is. Used by the recurrence engine,
    /// restore and import, which own the chain fields.
    /// Checklist item ids are normalised on the way in, so the stored
    /// record can differ from `task` when ids were blank or repeated.
    pub(crate) fn insert(&self, task: &Task) -> DbResult<()> {
        validate(task)?;
        let checklist = with_item_ids(task.checklist.clone());
        atomic(self.conn, |conn| {
            conn.execute(
                INSERT_TASK,
                params![
                    task.id,
                    task.title,
                    task.due_at,
                    task.duration_min,
                    task.category_id,
                    task.status,
                    serde_json::to_string(&checklist)?,
                    task.repeat_rule,
                    task.repeat_parent_id,
                    task.repeat_count,
                    task.repeat_until,
                    task.created_at,
                    task.updated_at,
                ],
            )?;
            write_checklist_index(conn, &task.id, &checklist)
        })
    }

    /// Applies a partial update and refreshes `updated_at`.
    ///
    /// Returns `false` when no task has this id.
    pub fn update(&self, id: &str, patch: &TaskPatch) -> DbResult<bool> {
        let Some(mut task) = self.get(id)? else {
            return Ok(false);
        };
        patch.apply_to(&mut task);
        if patch.checklist.is_some() {
            task.checklist = with_item_ids(task.checklist);
        }
        task.title = task.title.trim().to_string();
        task.updated_at = now_millis().max(task.updated_at);
        validate(&task)?;

        atomic(self.conn, |conn| {
            conn.execute(
                UPDATE_TASK,
                params![
                    task.id,
                    task.title,
                    task.due_at,
                    task.duration_min,
                    task.category_id,
                    task.status,
                    serde_json::to_string(&task.checklist)?,
                    task.repeat_rule,
                    task.repeat_until,
                    task.updated_at,
                ],
            )?;
            if patch.checklist.is_some() {
                write_checklist_index(conn, &task.id, &task.checklist)?;
            }
            Ok::<_, DbError>(())
        })?;
        Ok(true)
    }

    /// Returns `false` when the task was already gone.
    pub fn delete(&self, id: &str) -> DbResult<bool> {
        atomic(self.conn, |conn| {
            conn.execute(DELETE_CHECKLIST_ROWS, params![id])?;
            let affected = conn.execute(DELETE_TASK, params![id])?;
            Ok(affected > 0)
        })
    }

    /// Moves every task of `from` to `to`, or clears the reference when `to`
    /// is `None`. Returns the number of tasks touched.
    pub fn reassign_category(&self, from: &str, to: Option<&str>) -> DbResult<usize> {
        let affected = self.conn.execute(
            "UPDATE tasks SET category_id = ?2, updated_at = ?3 WHERE category_id = ?1",
            params![from, to, now_millis()],
        )?;
        Ok(affected)
    }

    pub(crate) fn clear(&self) -> DbResult<()> {
        self.conn.execute("DELETE FROM checklist_items", [])?;
        self.conn.execute("DELETE FROM tasks", [])?;
        Ok(())
    }
}

/// Replaces the index rows of one task's checklist.
pub(crate) fn write_checklist_index(conn: &Connection, task_id: &str, items: &[ChecklistItem]) -> DbResult<()> {
    conn.execute(DELETE_CHECKLIST_ROWS, params![task_id])?;
    for (position, item) in items.iter().enumerate() {
        conn.execute(
            INSERT_CHECKLIST_ROW,
            params![task_id, item.id, position as i64, item.text, item.checked],
        )?;
    }
    Ok(())
}

/// Gives every checklist item an id that is unique within its task.
/// Blank and repeated ids are replaced; the first holder of an id keeps it.
pub(crate) fn with_item_ids(mut items: Vec<ChecklistItem>) -> Vec<ChecklistItem> {
    let mut seen = HashSet::new();
    for item in items.iter_mut() {
        if item.id.is_empty() || !seen.insert(item.id.clone()) {
            item.id = uuid::Uuid::new_v4().to_string();
            seen.insert(item.id.clone());
        }
    }
    items
}

fn validate(task: &Task) -> DbResult<()> {
    if task.title.trim().is_empty() {
        return Err(DbError::validation("title", "must not be empty"));
    }
    if task.duration_min == Some(0) {
        return Err(DbError::validation("durationMin", "must be a positive number of minutes"));
    }
    Ok(())
}

fn map_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let raw_checklist: String = row.get(6)?;
    let checklist = serde_json::from_str(&raw_checklist)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        due_at: row.get(2)?,
        duration_min: row.get(3)?,
        category_id: row.get(4)?,
        status: row.get(5)?,
        checklist,
        repeat_rule: row.get(7)?,
        repeat_parent_id: row.get(8)?,
        repeat_count: row.get(9)?,
        repeat_until: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}
