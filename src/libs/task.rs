//! Task records and the value types that travel with them.
//!
//! A task is the unit of work: a title, an optional deadline, an owned
//! checklist and, for repeating work, the recurrence fields maintained by
//! the recurrence engine. All instants are epoch milliseconds.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Lifecycle state of a task.
///
/// `Pending` and `Done` toggle back and forth; `Archived` is a terminal
/// side-branch that recurrence never touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Done,
    Archived,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Pending, TaskStatus::Done, TaskStatus::Archived];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Done => "done",
            TaskStatus::Archived => "archived",
        }
    }

    /// Status reached by the toggle action of the task list.
    pub fn toggled(&self) -> TaskStatus {
        match self {
            TaskStatus::Pending => TaskStatus::Done,
            TaskStatus::Done | TaskStatus::Archived => TaskStatus::Pending,
        }
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "done" => Ok(TaskStatus::Done),
            "archived" => Ok(TaskStatus::Archived),
            other => Err(format!("unknown task status '{}'", other)),
        }
    }
}

impl ToSql for TaskStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TaskStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// One toggleable sub-item of a task's checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    #[serde(default)]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub checked: bool,
}

impl ChecklistItem {
    pub fn new(text: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            checked: false,
        }
    }
}

/// A persisted task record.
///
/// Serializes with camelCase keys; this is the shape found in snapshot
/// files and backups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub due_at: Option<i64>,
    #[serde(default)]
    pub duration_min: Option<u32>,
    #[serde(default)]
    pub category_id: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default)]
    pub repeat_rule: Option<String>,
    #[serde(default)]
    pub repeat_parent_id: Option<String>,
    #[serde(default)]
    pub repeat_count: Option<u32>,
    #[serde(default)]
    pub repeat_until: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// Whether completing this task should try to produce a successor.
    pub fn is_recurring(&self) -> bool {
        self.repeat_rule.as_deref().is_some_and(|r| !r.trim().is_empty()) && self.due_at.is_some()
    }

    /// Id of the first task of the recurrence chain this task belongs to.
    pub fn chain_root(&self) -> &str {
        self.repeat_parent_id.as_deref().unwrap_or(&self.id)
    }
}

/// Input for creating a task.
///
/// `id` and the timestamps are assigned when absent. The chain fields
/// (`repeat_parent_id`, `repeat_count`) are owned by the recurrence engine
/// and cannot be set from here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub due_at: Option<i64>,
    #[serde(default)]
    pub duration_min: Option<u32>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default)]
    pub repeat_rule: Option<String>,
    #[serde(default)]
    pub repeat_until: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl NewTask {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn due_at(mut self, due_at: i64) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn category(mut self, category_id: &str) -> Self {
        self.category_id = Some(category_id.to_string());
        self
    }

    pub fn repeat(mut self, rule: &str) -> Self {
        self.repeat_rule = Some(rule.to_string());
        self
    }

    pub fn repeat_until(mut self, until: i64) -> Self {
        self.repeat_until = Some(until);
        self
    }

    pub fn duration(mut self, minutes: u32) -> Self {
        self.duration_min = Some(minutes);
        self
    }

    pub fn checklist(mut self, items: &[&str]) -> Self {
        self.checklist = items.iter().map(|text| ChecklistItem::new(text)).collect();
        self
    }
}

/// Partial update of a task.
///
/// Outer `None` leaves a field untouched; for clearable fields
/// `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub due_at: Option<Option<i64>>,
    pub duration_min: Option<Option<u32>>,
    pub category_id: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub checklist: Option<Vec<ChecklistItem>>,
    pub repeat_rule: Option<Option<String>>,
    pub repeat_until: Option<Option<i64>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn title(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &TaskPatch::default()
    }

    /// Applies the patch to an in-memory record. Timestamps are not touched.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(due_at) = self.due_at {
            task.due_at = due_at;
        }
        if let Some(duration_min) = self.duration_min {
            task.duration_min = duration_min;
        }
        if let Some(category_id) = &self.category_id {
            task.category_id = category_id.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(checklist) = &self.checklist {
            task.checklist = checklist.clone();
        }
        if let Some(repeat_rule) = &self.repeat_rule {
            task.repeat_rule = repeat_rule.clone();
        }
        if let Some(repeat_until) = self.repeat_until {
            task.repeat_until = repeat_until;
        }
    }
}

/// Query selectors understood by `Tasks::fetch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFilter {
    All,
    Status(TaskStatus),
    /// Tasks due at or after (`inclusive`) / strictly after `from`.
    DueFrom { from: i64, inclusive: bool },
    /// Served by the `[status+due_at]` compound index.
    StatusDueFrom { status: TaskStatus, from: i64, inclusive: bool },
    /// Served by the `[category_id+status]` compound index.
    Category { category_id: String, status: Option<TaskStatus> },
    /// Every occurrence of a recurrence chain, root included.
    Chain(String),
    /// Tasks that still have at least one unchecked checklist item.
    OpenChecklist,
    ByIds(Vec<String>),
}
