//! State containers for presentation layers.
//!
//! Each store keeps an in-memory copy of its records next to a `loading`
//! flag and an `error` slot. Actions never return errors: a failure is
//! written to `error` (and cleared by the next action) so a front end can
//! render it inline. All stores share one [`Db`] behind an async mutex.

use crate::db::categories::{Category, CategoryPatch, NewCategory};
use crate::db::db::Db;
use crate::db::error::DbResult;
use crate::db::settings::is_internal_key;
use crate::libs::messages::Message;
use crate::libs::recurrence::StatusChange;
use crate::libs::reminders::{NoopReminders, Reminder, ReminderScheduler};
use crate::libs::task::{NewTask, Task, TaskPatch, TaskStatus};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedDb = Arc<Mutex<Db>>;

pub const THEME_KEY: &str = "theme";
pub const NOTIFICATIONS_KEY: &str = "notificationsEnabled";
pub const DEFAULT_CATEGORY_KEY: &str = "defaultCategoryId";

pub fn shared(db: Db) -> SharedDb {
    Arc::new(Mutex::new(db))
}

pub struct TaskStore {
    db: SharedDb,
    reminders: Arc<dyn ReminderScheduler>,
    pub tasks: Vec<Task>,
    pub loading: bool,
    pub error: Option<String>,
}

impl TaskStore {
    pub fn new(db: SharedDb) -> Self {
        Self {
            db,
            reminders: Arc::new(NoopReminders),
            tasks: Vec::new(),
            loading: false,
            error: None,
        }
    }

    pub fn with_reminders(mut self, reminders: Arc<dyn ReminderScheduler>) -> Self {
        self.reminders = reminders;
        self
    }

    pub async fn load(&mut self) {
        self.begin();
        let result = self.db.lock().await.tasks().all();
        match result {
            Ok(tasks) => self.tasks = tasks,
            Err(e) => self.fail(e),
        }
        self.loading = false;
    }

    pub async fn add(&mut self, new_task: NewTask) -> Option<Task> {
        self.begin();
        let result = self.db.lock().await.tasks().create(&new_task);
        self.loading = false;
        match result {
            Ok(task) => {
                self.sync_reminder(&task);
                self.tasks.push(task.clone());
                Some(task)
            }
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    /// Applies `patch`. A status change goes through the recurrence engine,
    /// so completing a repeating task here also produces its successor.
    pub async fn update(&mut self, id: &str, patch: TaskPatch) -> bool {
        self.begin();
        let status = patch.status;
        let fields = TaskPatch { status: None, ..patch };

        let result = apply_update(&*self.db.lock().await, id, &fields, status);
        self.loading = false;

        match result {
            Ok(Some((task, successor))) => {
                self.sync_reminder(&task);
                self.replace_local(task);
                if let Some(next) = successor {
                    self.sync_reminder(&next);
                    self.tasks.push(next);
                }
                true
            }
            Ok(None) => {
                self.fail(Message::TaskNotFoundWithId(id.to_string()));
                false
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    pub async fn remove(&mut self, id: &str) -> bool {
        self.begin();
        let result = self.db.lock().await.tasks().delete(id);
        self.loading = false;
        match result {
            Ok(true) => {
                self.reminders.cancel(id);
                self.tasks.retain(|t| t.id != id);
                true
            }
            Ok(false) => {
                self.fail(Message::TaskNotFoundWithId(id.to_string()));
                false
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    pub async fn toggle_status(&mut self, id: &str) -> Option<StatusChange> {
        self.begin();
        let result = self.db.lock().await.toggle_task_status(id);
        self.loading = false;
        match result {
            Ok(Some(change)) => {
                self.sync_reminder(&change.task);
                self.replace_local(change.task.clone());
                if let Some(next) = &change.successor {
                    self.sync_reminder(next);
                    self.tasks.push(next.clone());
                }
                Some(change)
            }
            Ok(None) => {
                self.fail(Message::TaskNotFoundWithId(id.to_string()));
                None
            }
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    fn sync_reminder(&self, task: &Task) {
        match Reminder::for_task(task) {
            Some(reminder) => self.reminders.schedule(reminder),
            None => self.reminders.cancel(&task.id),
        }
    }

    fn replace_local(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => *slot = task,
            None => self.tasks.push(task),
        }
    }

    fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    fn fail<E: Display>(&mut self, e: E) {
        self.error = Some(e.to_string());
    }
}

fn apply_update(
    db: &Db,
    id: &str,
    fields: &TaskPatch,
    status: Option<TaskStatus>,
) -> DbResult<Option<(Task, Option<Task>)>> {
    if !fields.is_empty() && !db.tasks().update(id, fields)? {
        return Ok(None);
    }
    match status {
        Some(status) => Ok(db.set_task_status(id, status)?.map(|change| (change.task, change.successor))),
        None => Ok(db.tasks().get(id)?.map(|task| (task, None))),
    }
}

pub struct CategoryStore {
    db: SharedDb,
    pub categories: Vec<Category>,
    pub loading: bool,
    pub error: Option<String>,
}

impl CategoryStore {
    pub fn new(db: SharedDb) -> Self {
        Self {
            db,
            categories: Vec::new(),
            loading: false,
            error: None,
        }
    }

    pub async fn load(&mut self) {
        self.loading = true;
        self.error = None;
        let result = self.db.lock().await.categories().all();
        match result {
            Ok(categories) => self.categories = categories,
            Err(e) => self.error = Some(e.to_string()),
        }
        self.loading = false;
    }

    pub async fn add(&mut self, new_category: NewCategory) -> Option<Category> {
        self.error = None;
        let result = self.db.lock().await.categories().create(&new_category);
        match result {
            Ok(category) => {
                self.categories.push(category.clone());
                self.categories.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
                Some(category)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                None
            }
        }
    }

    pub async fn update(&mut self, id: &str, patch: CategoryPatch) -> bool {
        self.error = None;
        let updated = {
            let db = self.db.lock().await;
            let categories = db.categories();
            match categories.update(id, &patch) {
                Ok(true) => categories.get(id),
                Ok(false) => Ok(None),
                Err(e) => Err(e),
            }
        };
        match updated {
            Ok(Some(category)) => {
                if let Some(slot) = self.categories.iter_mut().find(|c| c.id == id) {
                    *slot = category;
                }
                true
            }
            Ok(None) => {
                self.error = Some(Message::CategoryNotFoundWithId(id.to_string()).to_string());
                false
            }
            Err(e) => {
                self.error = Some(e.to_string());
                false
            }
        }
    }

    /// Deletes a category, moving its tasks to `reassign_to` or leaving
    /// them uncategorized.
    pub async fn remove(&mut self, id: &str, reassign_to: Option<&str>) -> bool {
        self.error = None;
        let result = self.db.lock().await.categories().delete(id, reassign_to);
        match result {
            Ok(true) => {
                self.categories.retain(|c| c.id != id);
                true
            }
            Ok(false) => {
                self.error = Some(Message::CategoryDeleteRefused(id.to_string()).to_string());
                false
            }
            Err(e) => {
                self.error = Some(e.to_string());
                false
            }
        }
    }

    pub async fn reorder(&mut self, ids: &[String]) -> bool {
        self.error = None;
        let result = {
            let db = self.db.lock().await;
            let categories = db.categories();
            match categories.update_order(ids) {
                Ok(true) => categories.all().map(Some),
                Ok(false) => Ok(None),
                Err(e) => Err(e),
            }
        };
        match result {
            Ok(Some(categories)) => {
                self.categories = categories;
                true
            }
            Ok(None) => {
                self.error = Some(Message::CategoryOrderRejected.to_string());
                false
            }
            Err(e) => {
                self.error = Some(e.to_string());
                false
            }
        }
    }
}

/// User preferences kept in the `settings` store.
pub struct SettingsStore {
    db: SharedDb,
    pub values: BTreeMap<String, Value>,
    pub loading: bool,
    pub error: Option<String>,
}

impl SettingsStore {
    pub fn new(db: SharedDb) -> Self {
        Self {
            db,
            values: BTreeMap::new(),
            loading: false,
            error: None,
        }
    }

    pub async fn load(&mut self) {
        self.loading = true;
        self.error = None;
        let result = self.db.lock().await.settings().user_settings();
        match result {
            Ok(settings) => self.values = settings.into_iter().map(|s| (s.key, s.value)).collect(),
            Err(e) => self.error = Some(e.to_string()),
        }
        self.loading = false;
    }

    pub fn theme(&self) -> Option<&str> {
        self.values.get(THEME_KEY).and_then(Value::as_str)
    }

    pub fn notifications_enabled(&self) -> bool {
        self.values.get(NOTIFICATIONS_KEY).and_then(Value::as_bool).unwrap_or(true)
    }

    pub fn default_category(&self) -> Option<&str> {
        self.values.get(DEFAULT_CATEGORY_KEY).and_then(Value::as_str)
    }

    pub async fn set_theme(&mut self, theme: &str) -> bool {
        self.update_setting(THEME_KEY, Value::from(theme)).await
    }

    pub async fn set_notifications_enabled(&mut self, enabled: bool) -> bool {
        self.update_setting(NOTIFICATIONS_KEY, Value::from(enabled)).await
    }

    /// `None` clears the preference. A category id that does not exist is
    /// refused.
    pub async fn set_default_category(&mut self, category_id: Option<&str>) -> bool {
        let Some(id) = category_id else {
            return self.update_setting(DEFAULT_CATEGORY_KEY, Value::Null).await;
        };

        let exists = self.db.lock().await.categories().get(id);
        match exists {
            Ok(Some(_)) => self.update_setting(DEFAULT_CATEGORY_KEY, Value::from(id)).await,
            Ok(None) => {
                self.error = Some(Message::CategoryNotFoundWithId(id.to_string()).to_string());
                false
            }
            Err(e) => {
                self.error = Some(e.to_string());
                false
            }
        }
    }

    pub async fn update_setting(&mut self, key: &str, value: Value) -> bool {
        self.error = None;
        if is_internal_key(key) {
            self.error = Some(Message::SettingKeyReserved(key.to_string()).to_string());
            return false;
        }

        let result = self.db.lock().await.settings().put(key, &value);
        match result {
            Ok(()) => {
                self.values.insert(key.to_string(), value);
                true
            }
            Err(e) => {
                self.error = Some(e.to_string());
                false
            }
        }
    }
}
