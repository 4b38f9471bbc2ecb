//! Export and import of the whole store.
//!
//! The snapshot file is JSON:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "exportedAt": 1736899200000,
//!   "data": { "tasks": [...], "categories": [...], "settings": [...] }
//! }
//! ```
//!
//! Imports are validated as a whole before anything is written and then
//! applied in one transaction over all three stores. Imported categories and
//! tasks always receive fresh ids; references between them are rewritten
//! through the old-to-new id maps.
//!
//! CSV export is a flat task listing for spreadsheets and cannot be
//! imported back.

use crate::db::categories::{Categories, Category};
use crate::db::db::Db;
use crate::db::error::{DbError, DbResult};
use crate::db::schema::StoreName;
use crate::db::settings::{Setting, Settings};
use crate::db::tasks::Tasks;
use crate::libs::formatter::{format_timestamp, now_millis};
use crate::libs::messages::Message;
use crate::libs::task::{ChecklistItem, Task, TaskStatus};
use crate::{msg_debug, msg_success};
use anyhow::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const EXPORT_FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// Snapshot file, importable
    Json,
    /// Flat task listing
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ImportMode {
    /// Clear every store first; imported settings overwrite
    Replace,
    /// Keep existing records; existing settings win
    Merge,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid import data: {0}")]
    Invalid(String),

    #[error("cannot read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Db(#[from] DbError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub version: String,
    pub exported_at: i64,
    pub data: ExportSections,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSections {
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
    pub settings: Vec<Setting>,
}

/// A validated import file. Ids are optional: they are only used to
/// rewrite references.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportPayload {
    pub version: String,
    pub exported_at: Option<i64>,
    pub tasks: Vec<ImportedTask>,
    pub categories: Vec<ImportedCategory>,
    pub settings: Vec<Setting>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedTask {
    pub id: Option<String>,
    pub title: String,
    pub due_at: Option<i64>,
    pub duration_min: Option<u32>,
    pub category_id: Option<String>,
    pub status: TaskStatus,
    pub checklist: Vec<ChecklistItem>,
    pub repeat_rule: Option<String>,
    pub repeat_parent_id: Option<String>,
    pub repeat_count: Option<u32>,
    pub repeat_until: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedCategory {
    pub id: Option<String>,
    pub name: String,
    pub color: String,
    pub order: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub tasks: usize,
    pub categories: usize,
    pub settings_written: usize,
    pub settings_skipped: usize,
}

/// Snapshots the stores for export. Bookkeeping settings are left out.
pub fn export_data(db: &mut Db) -> DbResult<ExportPayload> {
    db.read_transaction(&StoreName::ALL, |tx| {
        Ok(ExportPayload {
            version: EXPORT_FORMAT_VERSION.to_string(),
            exported_at: now_millis(),
            data: ExportSections {
                tasks: Tasks::new(tx).all()?,
                categories: Categories::new(tx).all()?,
                settings: Settings::new(tx).user_settings()?,
            },
        })
    })
}

/// Checks the whole payload and converts it.
///
/// Every problem found is listed in the single error returned; nothing is
/// accepted partially.
pub fn validate_import_data(payload: &Value) -> Result<ImportPayload, ImportError> {
    let root = payload
        .as_object()
        .ok_or_else(|| ImportError::Invalid("top level must be an object".to_string()))?;

    let version = match root.get("version") {
        None | Some(Value::Null) => EXPORT_FORMAT_VERSION.to_string(),
        Some(Value::String(v)) => v.clone(),
        Some(_) => return Err(ImportError::Invalid("version must be a string".to_string())),
    };
    let exported_at = root.get("exportedAt").and_then(as_millis);

    let data = root
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| ImportError::Invalid("data must be an object".to_string()))?;

    let mut problems = Vec::new();
    let tasks = section(data, "tasks", &mut problems)
        .iter()
        .enumerate()
        .filter_map(|(i, record)| read_task(record, &format!("data.tasks[{}]", i), &mut problems))
        .collect();
    let categories = section(data, "categories", &mut problems)
        .iter()
        .enumerate()
        .filter_map(|(i, record)| read_category(record, &format!("data.categories[{}]", i), &mut problems))
        .collect();
    let settings = section(data, "settings", &mut problems)
        .iter()
        .enumerate()
        .filter_map(|(i, record)| read_setting(record, &format!("data.settings[{}]", i), &mut problems))
        .collect();

    if !problems.is_empty() {
        return Err(ImportError::Invalid(problems.join("; ")));
    }

    Ok(ImportPayload {
        version,
        exported_at,
        tasks,
        categories,
        settings,
    })
}

/// Validates and applies `payload` in one transaction over every store.
pub fn import_data(db: &mut Db, payload: &Value, mode: ImportMode) -> Result<ImportSummary, ImportError> {
    let payload = validate_import_data(payload)?;

    let summary = db.transaction(&StoreName::ALL, |tx| -> Result<ImportSummary, ImportError> {
        let tasks = Tasks::new(tx);
        let categories = Categories::new(tx);
        let settings = Settings::new(tx);
        let mut summary = ImportSummary::default();

        if mode == ImportMode::Replace {
            tasks.clear()?;
            categories.clear()?;
            settings.clear()?;
        }

        let mut category_ids: HashMap<String, String> = HashMap::new();
        for imported in &payload.categories {
            let new_id = match categories.get_by_name(&imported.name)? {
                // Names stay unique: a clash maps onto the existing record.
                Some(existing) => existing.id,
                None => {
                    let category = Category {
                        id: uuid::Uuid::new_v4().to_string(),
                        name: imported.name.trim().to_string(),
                        color: imported.color.clone(),
                        order: imported.order,
                    };
                    categories.insert(&category)?;
                    summary.categories += 1;
                    category.id
                }
            };
            if let Some(old_id) = &imported.id {
                category_ids.insert(old_id.clone(), new_id);
            }
        }

        let task_ids: HashMap<String, String> = payload
            .tasks
            .iter()
            .filter_map(|t| t.id.clone())
            .map(|old_id| (old_id, uuid::Uuid::new_v4().to_string()))
            .collect();

        for imported in &payload.tasks {
            let id = imported
                .id
                .as_ref()
                .and_then(|old| task_ids.get(old).cloned())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let task = Task {
                id,
                title: imported.title.clone(),
                due_at: imported.due_at,
                duration_min: imported.duration_min,
                category_id: remap(&imported.category_id, &category_ids),
                status: imported.status,
                checklist: imported.checklist.clone(),
                repeat_rule: imported.repeat_rule.clone(),
                repeat_parent_id: remap(&imported.repeat_parent_id, &task_ids),
                repeat_count: imported.repeat_count,
                repeat_until: imported.repeat_until,
                created_at: imported.created_at,
                updated_at: imported.updated_at,
            };
            tasks.insert(&task)?;
            summary.tasks += 1;
        }

        for setting in &payload.settings {
            if setting.is_internal() {
                summary.settings_skipped += 1;
                continue;
            }
            match mode {
                ImportMode::Replace => {
                    settings.put(&setting.key, &setting.value)?;
                    summary.settings_written += 1;
                }
                ImportMode::Merge => {
                    if settings.insert_if_absent(&setting.key, &setting.value)? {
                        summary.settings_written += 1;
                    } else {
                        summary.settings_skipped += 1;
                    }
                }
            }
        }

        if mode == ImportMode::Replace {
            categories.ensure_default()?;
        }
        Ok(summary)
    })?;

    msg_debug!(Message::ImportCompleted(
        summary.tasks,
        summary.categories,
        summary.settings_written,
        summary.settings_skipped
    ));
    Ok(summary)
}

/// Loads an import file as raw JSON for [`validate_import_data`].
pub fn read_import_file(path: &Path) -> Result<Value, ImportError> {
    let content = fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Writes export files.
pub struct Exporter {
    format: ExportFormat,
    output_path: PathBuf,
}

impl Exporter {
    /// Without an explicit path the file is named
    /// `tasknest_export_<YYYYMMDD_HHMMSS>.<ext>` inside `directory` (or the
    /// working directory).
    pub fn new(format: ExportFormat, output_path: Option<PathBuf>, directory: Option<&Path>) -> Self {
        let output_path = output_path.unwrap_or_else(|| {
            let file_name = default_file_name(format);
            match directory {
                Some(dir) => dir.join(file_name),
                None => PathBuf::from(file_name),
            }
        });
        Self { format, output_path }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn export(&self, db: &mut Db) -> Result<()> {
        if let Some(parent) = self.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let payload = export_data(db)?;
        match self.format {
            ExportFormat::Json => {
                let json = serde_json::to_string_pretty(&payload)?;
                File::create(&self.output_path)?.write_all(json.as_bytes())?;
            }
            ExportFormat::Csv => self.export_tasks_csv(&payload.data)?,
        }

        msg_success!(Message::ExportCompleted(self.output_path.display().to_string()));
        Ok(())
    }

    fn export_tasks_csv(&self, data: &ExportSections) -> Result<()> {
        let category_names: HashMap<&str, &str> =
            data.categories.iter().map(|c| (c.id.as_str(), c.name.as_str())).collect();

        let mut wtr = csv::Writer::from_path(&self.output_path)?;
        wtr.write_record(["ID", "Title", "Status", "Due", "Duration", "Category", "Checklist", "Repeat"])?;

        for task in &data.tasks {
            let category = task
                .category_id
                .as_deref()
                .map(|id| category_names.get(id).copied().unwrap_or(id).to_string())
                .unwrap_or_default();
            let checked = task.checklist.iter().filter(|item| item.checked).count();
            wtr.write_record([
                task.id.clone(),
                task.title.clone(),
                task.status.to_string(),
                format_timestamp(task.due_at),
                task.duration_min.map(|m| m.to_string()).unwrap_or_default(),
                category,
                format!("{}/{}", checked, task.checklist.len()),
                task.repeat_rule.clone().unwrap_or_default(),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }
}

pub fn default_file_name(format: ExportFormat) -> String {
    let extension = match format {
        ExportFormat::Json => "json",
        ExportFormat::Csv => "csv",
    };
    format!("tasknest_export_{}.{}", Local::now().format("%Y%m%d_%H%M%S"), extension)
}

fn remap(id: &Option<String>, ids: &HashMap<String, String>) -> Option<String> {
    id.as_ref().map(|old| ids.get(old).cloned().unwrap_or_else(|| old.clone()))
}

fn section<'v>(data: &'v Map<String, Value>, name: &str, problems: &mut Vec<String>) -> &'v [Value] {
    match data.get(name).and_then(Value::as_array) {
        Some(records) => records,
        None => {
            problems.push(format!("data.{} must be an array", name));
            &[]
        }
    }
}

fn as_millis(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64))
}

fn optional_string(record: &Map<String, Value>, key: &str) -> Option<String> {
    record.get(key).and_then(Value::as_str).map(str::to_string)
}

fn read_task(record: &Value, path: &str, problems: &mut Vec<String>) -> Option<ImportedTask> {
    let Some(record) = record.as_object() else {
        problems.push(format!("{} must be an object", path));
        return None;
    };
    let before = problems.len();

    let title = match record.get("title").and_then(Value::as_str) {
        Some(title) if !title.trim().is_empty() => title.to_string(),
        _ => {
            problems.push(format!("{}.title must be a non-empty string", path));
            String::new()
        }
    };
    let status = match record.get("status").and_then(Value::as_str).map(str::parse::<TaskStatus>) {
        Some(Ok(status)) => status,
        _ => {
            problems.push(format!("{}.status must be one of pending, done, archived", path));
            TaskStatus::Pending
        }
    };
    let created_at = record.get("createdAt").and_then(as_millis);
    if created_at.is_none() {
        problems.push(format!("{}.createdAt must be a number", path));
    }
    let updated_at = record.get("updatedAt").and_then(as_millis);
    if updated_at.is_none() {
        problems.push(format!("{}.updatedAt must be a number", path));
    }
    let checklist = match record.get("checklist") {
        None | Some(Value::Null) => Vec::new(),
        Some(items) => match serde_json::from_value::<Vec<ChecklistItem>>(items.clone()) {
            Ok(items) => items,
            Err(e) => {
                problems.push(format!("{}.checklist is malformed: {}", path, e));
                Vec::new()
            }
        },
    };

    if problems.len() > before {
        return None;
    }

    Some(ImportedTask {
        id: optional_string(record, "id"),
        title,
        due_at: record.get("dueAt").and_then(as_millis),
        duration_min: record
            .get("durationMin")
            .and_then(as_millis)
            .and_then(|m| u32::try_from(m).ok())
            .filter(|m| *m > 0),
        category_id: optional_string(record, "categoryId"),
        status,
        checklist,
        repeat_rule: optional_string(record, "repeatRule"),
        repeat_parent_id: optional_string(record, "repeatParentId"),
        repeat_count: record
            .get("repeatCount")
            .and_then(as_millis)
            .and_then(|c| u32::try_from(c).ok()),
        repeat_until: record.get("repeatUntil").and_then(as_millis),
        created_at: created_at.unwrap_or_default(),
        updated_at: updated_at.unwrap_or_default(),
    })
}

fn read_category(record: &Value, path: &str, problems: &mut Vec<String>) -> Option<ImportedCategory> {
    let Some(record) = record.as_object() else {
        problems.push(format!("{} must be an object", path));
        return None;
    };
    let before = problems.len();

    let name = record.get("name").and_then(Value::as_str).filter(|n| !n.trim().is_empty());
    if name.is_none() {
        problems.push(format!("{}.name must be a non-empty string", path));
    }
    let color = record.get("color").and_then(Value::as_str);
    if color.is_none() {
        problems.push(format!("{}.color must be a string", path));
    }
    let order = record.get("order").and_then(as_millis);
    if order.is_none() {
        problems.push(format!("{}.order must be a number", path));
    }

    if problems.len() > before {
        return None;
    }
    Some(ImportedCategory {
        id: optional_string(record, "id"),
        name: name.unwrap_or_default().to_string(),
        color: color.unwrap_or_default().to_string(),
        order: order.unwrap_or_default(),
    })
}

fn read_setting(record: &Value, path: &str, problems: &mut Vec<String>) -> Option<Setting> {
    let Some(record) = record.as_object() else {
        problems.push(format!("{} must be an object", path));
        return None;
    };
    match record.get("key").and_then(Value::as_str) {
        Some(key) if !key.is_empty() => Some(Setting::new(key, record.get("value").cloned().unwrap_or(Value::Null))),
        _ => {
            problems.push(format!("{}.key must be a non-empty string", path));
            None
        }
    }
}

impl Db {
    pub fn export_data(&mut self) -> DbResult<ExportPayload> {
        export_data(self)
    }

    pub fn import_data(&mut self, payload: &Value, mode: ImportMode) -> Result<ImportSummary, ImportError> {
        import_data(self, payload, mode)
    }
}

