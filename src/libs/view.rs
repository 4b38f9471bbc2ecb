//! Table output for the command line.

use crate::db::backup::HealthReport;
use crate::db::categories::Category;
use crate::db::migrations::MigrationRecord;
use crate::db::settings::Setting;
use crate::libs::formatter::format_timestamp;
use crate::libs::task::Task;
use anyhow::Result;
use prettytable::{row, Table};
use std::collections::HashMap;

pub struct View {}

impl View {
    /// Prints tasks; `categories` resolves category ids to names.
    pub fn tasks(tasks: &[Task], categories: &[Category]) -> Result<()> {
        let names: HashMap<&str, &str> = categories.iter().map(|c| (c.id.as_str(), c.name.as_str())).collect();
        let mut table = Table::new();

        table.add_row(row!["ID", "TITLE", "STATUS", "DUE", "CATEGORY", "CHECKLIST", "REPEAT"]);
        for task in tasks {
            let category = task
                .category_id
                .as_deref()
                .map(|id| names.get(id).copied().unwrap_or(id))
                .unwrap_or("-");
            let checked = task.checklist.iter().filter(|item| item.checked).count();
            let checklist = if task.checklist.is_empty() {
                "-".to_string()
            } else {
                format!("{}/{}", checked, task.checklist.len())
            };
            let repeat = match (&task.repeat_rule, task.repeat_count) {
                (Some(rule), Some(count)) => format!("{} (#{})", rule, count + 1),
                (Some(rule), None) => rule.clone(),
                _ => "-".to_string(),
            };
            table.add_row(row![
                short_id(&task.id),
                task.title,
                task.status,
                format_timestamp(task.due_at),
                category,
                checklist,
                repeat
            ]);
        }
        table.printstd();

        Ok(())
    }

    pub fn categories(categories: &[Category]) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["ORDER", "ID", "NAME", "COLOR"]);
        for category in categories {
            table.add_row(row![category.order, category.id, category.name, category.color]);
        }
        table.printstd();

        Ok(())
    }

    pub fn settings(settings: &[Setting]) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["KEY", "VALUE"]);
        for setting in settings {
            table.add_row(row![setting.key, setting.value]);
        }
        table.printstd();

        Ok(())
    }

    pub fn migration_history(history: &[MigrationRecord]) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["VERSION", "APPLIED", "RESULT", "ERROR"]);
        for record in history {
            table.add_row(row![
                record.version,
                format_timestamp(Some(record.timestamp)),
                if record.success { "ok" } else { "failed" },
                record.error.as_deref().unwrap_or("")
            ]);
        }
        table.printstd();

        Ok(())
    }

    pub fn health(report: &HealthReport) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["SCHEMA", format!("v{} (latest v{})", report.version, report.latest_version)]);
        table.add_row(row!["TASKS", report.counts.tasks]);
        table.add_row(row!["CATEGORIES", report.counts.categories]);
        table.add_row(row!["SETTINGS", report.counts.settings]);
        table.printstd();

        Ok(())
    }
}

/// First block of a UUID, enough to tell tasks apart in a listing.
fn short_id(id: &str) -> &str {
    id.split('-').next().unwrap_or(id)
}
