//! Text of every [`Message`].
//!
//! All wording is kept in this one match so that phrasing stays consistent
//! across commands and parameters are interpolated in a single place.

use super::types::Message;
use std::fmt::{Display, Formatter, Result};

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let text = match self {
            // === TASK MESSAGES ===
            Message::TaskCreatedWithName(title) => format!("Task '{}' created.", title),
            Message::TaskUpdatedWithName(title) => format!("Task '{}' updated.", title),
            Message::TaskStatusChanged(title, status) => format!("Task '{}' is now {}.", title, status),
            Message::TaskNotFoundWithId(id) => format!("Task with ID {} not found.", id),
            Message::TaskIdAmbiguous(prefix, count) => format!("ID prefix '{}' matches {} tasks; use more characters.", prefix, count),
            Message::TasksDeletedCount(count) => format!("Deleted {} task(s).", count),
            Message::TasksHeader => "Tasks:".to_string(),
            Message::TasksToBeDeleted => "The following tasks will be deleted:".to_string(),
            Message::NoTasksFound => "No tasks found.".to_string(),
            Message::NoChangesDetected => "No changes detected.".to_string(),
            Message::ConfirmDeleteTasks(count) => format!("Are you sure you want to delete {} task(s)?", count),
            Message::ChainHeader(title) => format!("Occurrences of '{}':", title),
            Message::InvalidDate(input) => format!("Cannot read '{}' as a date. Use YYYY-MM-DD or YYYY-MM-DD HH:MM.", input),

            // === RECURRENCE MESSAGES ===
            Message::InvalidRepeatRule(rule, reason) => format!("Invalid repeat rule '{}': {}", rule, reason),
            Message::RepeatWithoutDueDate => "A repeat rule only takes effect on tasks with a due date.".to_string(),
            Message::NextOccurrenceScheduled(due) => format!("Next occurrence scheduled for {}.", due),
            Message::RecurrenceChainEnded(title) => format!("Recurrence of '{}' has no further occurrences.", title),
            Message::RecurrenceFailed(title, error) => format!("Could not schedule the next occurrence of '{}': {}", title, error),
            Message::SuccessorAlreadyExists(title) => format!("Next occurrence of '{}' already exists.", title),
            Message::SuccessorCreated(title, due) => format!("Created next occurrence of '{}' due {}.", title, due),

            // === CATEGORY MESSAGES ===
            Message::CategoryCreated(name) => format!("Category '{}' created.", name),
            Message::CategoryUpdated(name) => format!("Category '{}' updated.", name),
            Message::CategoryDeleted(name) => format!("Category '{}' deleted.", name),
            Message::CategoryNotFound(name) => format!("Category '{}' not found.", name),
            Message::CategoryNotFoundWithId(id) => format!("Category with ID {} not found.", id),
            Message::CategoryDeleteRefused(name) => format!(
                "Category '{}' was not deleted: it is protected, missing, or the reassignment target is invalid.",
                name
            ),
            Message::CategoryOrderRejected => "Order not changed: the list names an unknown category.".to_string(),
            Message::CategoriesReordered => "Categories reordered.".to_string(),
            Message::CategoriesHeader => "Categories:".to_string(),
            Message::NoCategoriesFound => "No categories found.".to_string(),

            // === SETTING MESSAGES ===
            Message::SettingValue(key, value) => format!("{} = {}", key, value),
            Message::SettingSaved(key) => format!("Setting '{}' saved.", key),
            Message::SettingDeleted(key) => format!("Setting '{}' deleted.", key),
            Message::SettingNotFound(key) => format!("Setting '{}' is not set.", key),
            Message::SettingKeyReserved(key) => format!("Key '{}' is reserved for internal bookkeeping.", key),
            Message::NoSettingsFound => "No settings stored.".to_string(),

            // === STORE MESSAGES ===
            Message::StoreOpenFailed(error) => format!("Cannot open the task database: {}", error),
            Message::TransactionStarted(stores) => format!("Transaction started over [{}]", stores),
            Message::TransactionRolledBack(stores) => format!("Transaction over [{}] rolled back", stores),
            Message::SavepointRollbackFailed(error) => format!("Savepoint rollback failed: {}", error),
            Message::StaleLockReclaimed(name) => format!("Reclaimed stale lock '{}'.", name),
            Message::LockRetry(name, attempt) => format!("Lock '{}' busy (attempt {}), retrying", name, attempt),
            Message::LockReleaseFailed(key, error) => format!("Could not release lock '{}': {}", key, error),
            Message::ReminderChannelClosed => "Reminder channel closed; request dropped".to_string(),

            // === MIGRATION MESSAGES ===
            Message::DatabaseVersion(version, name) => format!("Database schema version: v{} ({})", version, name),
            Message::DatabaseNeedsUpdate(latest) => format!("Migrations pending up to v{}.", latest),
            Message::DatabaseUpToDate(version) => format!("Database is up to date (v{}).", version),
            Message::SchemaNewerThanKnown(current, latest) => format!(
                "Database schema v{} is newer than this version of tasknest knows (v{}).",
                current, latest
            ),
            Message::MigrationsFound(count) => format!("Found {} pending migration(s)", count),
            Message::RunningMigration(version, name) => format!("Running migration v{}: {}", version, name),
            Message::MigrationCompleted(version) => format!("Migration v{} completed", version),
            Message::MigrationFailed(version, error) => format!("Migration v{} failed: {}", version, error),
            Message::MigrationRecordFailed(version, error) => format!("Could not record migration v{}: {}", version, error),
            Message::MigrationDowngradeRefused(current, target) => {
                format!("Cannot migrate from v{} down to v{}: downgrades are not supported.", current, target)
            }
            Message::MigrationUnknownTarget(target) => format!("Unknown schema version v{}.", target),
            Message::MigrationStopped(version) => format!("Migration stopped at v{}. See the migration history.", version),
            Message::AllMigrationsCompleted(version) => format!("Database migrated to v{}.", version),
            Message::MigrationHistory => "Migration history:".to_string(),
            Message::NoMigrationHistory => "No migrations recorded.".to_string(),

            // === BACKUP MESSAGES ===
            Message::BackupWritten(path, tasks, categories) => {
                format!("Backup written to {} ({} tasks, {} categories).", path, tasks, categories)
            }
            Message::ConfirmRestore(tasks, categories) => format!(
                "Replace ALL current data with the backup ({} tasks, {} categories)?",
                tasks, categories
            ),
            Message::RestoreRefusedNewer(snapshot, latest) => {
                format!("Backup is from schema v{}, newer than the supported v{}; not restored.", snapshot, latest)
            }
            Message::RestoreCompleted(tasks, categories, settings) => {
                format!("Restored {} tasks, {} categories and {} settings.", tasks, categories, settings)
            }
            Message::RestoreFailed(reason) => format!("Restore failed: {}", reason),
            Message::HealthOk => "Database is healthy.".to_string(),
            Message::HealthIssue(issue) => issue.clone(),
            Message::HealthIssuesFound(count) => format!("Health check found {} issue(s).", count),

            // === EXPORT / IMPORT MESSAGES ===
            Message::ExportingData(format) => format!("Exporting data as {}...", format),
            Message::ExportCompleted(path) => format!("Export completed: {}", path),
            Message::ConfirmReplaceImport => "Replace import clears ALL tasks, categories and settings first. Continue?".to_string(),
            Message::ImportCompleted(tasks, categories, written, skipped) => format!(
                "Imported {} tasks and {} categories; {} settings written, {} skipped.",
                tasks, categories, written, skipped
            ),
            Message::ImportFailed(reason) => format!("Import failed: {}", reason),

            // === GENERAL ===
            Message::OperationCancelled => "Operation cancelled.".to_string(),
        };
        write!(f, "{}", text)
    }
}
