use super::{open_db, resolve_category, resolve_task};
use crate::{
    libs::{
        formatter::{format_timestamp, now_millis, parse_datetime},
        messages::Message,
        recurrence::RepeatRule,
        task::{NewTask, Task, TaskFilter, TaskPatch, TaskStatus},
        view::View,
    },
    msg_bail_anyhow, msg_info, msg_print, msg_success, msg_warning,
};
use anyhow::Result;
use clap::{Args, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm};

#[derive(Debug, Args)]
pub struct TaskArgs {
    #[command(subcommand)]
    command: TaskCommand,
}

#[derive(Debug, Subcommand)]
enum TaskCommand {
    /// Create a task
    Add {
        title: String,
        /// Due date: `YYYY-MM-DD HH:MM`, `YYYY-MM-DD` or RFC 3339
        #[arg(short, long)]
        due: Option<String>,
        /// Expected duration in minutes
        #[arg(long)]
        duration: Option<u32>,
        /// Category name or id
        #[arg(short, long)]
        category: Option<String>,
        /// Recurrence rule, e.g. `FREQ=WEEKLY;BYDAY=MO,WE` or `daily`
        #[arg(short, long)]
        repeat: Option<String>,
        /// Last date an occurrence may fall on
        #[arg(long)]
        until: Option<String>,
        /// Checklist item (repeatable)
        #[arg(short, long = "item")]
        items: Vec<String>,
    },
    /// List tasks
    List {
        #[arg(short, long, value_enum)]
        status: Option<TaskStatus>,
        /// Category name or id
        #[arg(short, long)]
        category: Option<String>,
        /// Only tasks due from now on
        #[arg(long)]
        upcoming: bool,
        /// Only tasks with unchecked checklist items
        #[arg(long)]
        open_checklist: bool,
    },
    /// Mark a task as done
    Done { id: String },
    /// Flip a task between pending and done
    Toggle { id: String },
    /// Archive a task
    Archive { id: String },
    /// Change a task
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        due: Option<String>,
        #[arg(long, conflicts_with = "due")]
        clear_due: bool,
        #[arg(long)]
        duration: Option<u32>,
        /// Category name or id
        #[arg(short, long)]
        category: Option<String>,
        #[arg(long, conflicts_with = "category")]
        clear_category: bool,
        #[arg(short, long)]
        repeat: Option<String>,
        #[arg(long, conflicts_with = "repeat")]
        clear_repeat: bool,
        #[arg(long)]
        until: Option<String>,
    },
    /// Delete one or more tasks
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(short, long)]
        yes: bool,
    },
    /// Show every occurrence of a recurring task
    Chain { id: String },
}

pub async fn cmd(args: TaskArgs) -> Result<()> {
    match args.command {
        TaskCommand::Add {
            title,
            due,
            duration,
            category,
            repeat,
            until,
            items,
        } => handle_add(title, due, duration, category, repeat, until, items),
        TaskCommand::List {
            status,
            category,
            upcoming,
            open_checklist,
        } => handle_list(status, category, upcoming, open_checklist),
        TaskCommand::Done { id } => handle_status(&id, TaskStatus::Done),
        TaskCommand::Archive { id } => handle_status(&id, TaskStatus::Archived),
        TaskCommand::Toggle { id } => handle_toggle(&id),
        TaskCommand::Edit {
            id,
            title,
            due,
            clear_due,
            duration,
            category,
            clear_category,
            repeat,
            clear_repeat,
            until,
        } => {
            let mut patch = TaskPatch {
                title,
                duration_min: duration.map(Some),
                ..Default::default()
            };
            if clear_due {
                patch.due_at = Some(None);
            } else if let Some(due) = due {
                patch.due_at = Some(Some(parse_date_arg(&due)?));
            }
            if clear_repeat {
                patch.repeat_rule = Some(None);
            } else if let Some(rule) = repeat {
                patch.repeat_rule = Some(Some(check_rule(&rule)?));
            }
            if let Some(until) = until {
                patch.repeat_until = Some(Some(parse_date_arg(&until)?));
            }
            handle_edit(&id, patch, category, clear_category)
        }
        TaskCommand::Delete { ids, yes } => handle_delete(ids, yes),
        TaskCommand::Chain { id } => handle_chain(&id),
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_add(
    title: String,
    due: Option<String>,
    duration: Option<u32>,
    category: Option<String>,
    repeat: Option<String>,
    until: Option<String>,
    items: Vec<String>,
) -> Result<()> {
    let db = open_db()?;

    let mut new_task = NewTask::new(&title);
    if let Some(due) = due {
        new_task = new_task.due_at(parse_date_arg(&due)?);
    }
    if let Some(minutes) = duration {
        new_task = new_task.duration(minutes);
    }
    if let Some(category) = category {
        new_task = new_task.category(&resolve_category(&db, &category)?.id);
    }
    if let Some(rule) = repeat {
        if new_task.due_at.is_none() {
            msg_warning!(Message::RepeatWithoutDueDate);
        }
        new_task = new_task.repeat(&check_rule(&rule)?);
    }
    if let Some(until) = until {
        new_task = new_task.repeat_until(parse_date_arg(&until)?);
    }
    let item_refs: Vec<&str> = items.iter().map(String::as_str).collect();
    new_task = new_task.checklist(&item_refs);

    let task = db.tasks().create(&new_task)?;
    msg_success!(Message::TaskCreatedWithName(task.title));
    Ok(())
}

fn handle_list(status: Option<TaskStatus>, category: Option<String>, upcoming: bool, open_checklist: bool) -> Result<()> {
    let db = open_db()?;

    let filter = match (category, status, upcoming) {
        _ if open_checklist => TaskFilter::OpenChecklist,
        (Some(category), status, _) => TaskFilter::Category {
            category_id: resolve_category(&db, &category)?.id,
            status,
        },
        (None, Some(status), true) => TaskFilter::StatusDueFrom {
            status,
            from: now_millis(),
            inclusive: true,
        },
        (None, None, true) => TaskFilter::DueFrom {
            from: now_millis(),
            inclusive: true,
        },
        (None, Some(status), false) => TaskFilter::Status(status),
        (None, None, false) => TaskFilter::All,
    };

    let tasks = db.tasks().fetch(&filter)?;
    if tasks.is_empty() {
        msg_info!(Message::NoTasksFound);
        return Ok(());
    }

    msg_print!(Message::TasksHeader, true);
    View::tasks(&tasks, &db.categories().all()?)?;
    Ok(())
}

fn handle_status(id: &str, status: TaskStatus) -> Result<()> {
    let db = open_db()?;
    let task = resolve_task(&db, id)?;

    match db.set_task_status(&task.id, status)? {
        Some(change) => report_change(change.task.title, change.task.status, change.successor),
        None => msg_bail_anyhow!(Message::TaskNotFoundWithId(id.to_string())),
    }
    Ok(())
}

fn handle_toggle(id: &str) -> Result<()> {
    let db = open_db()?;
    let task = resolve_task(&db, id)?;

    match db.toggle_task_status(&task.id)? {
        Some(change) => report_change(change.task.title, change.task.status, change.successor),
        None => msg_bail_anyhow!(Message::TaskNotFoundWithId(id.to_string())),
    }
    Ok(())
}

fn report_change(title: String, status: TaskStatus, successor: Option<Task>) {
    msg_success!(Message::TaskStatusChanged(title, status.to_string()));
    if let Some(next) = successor {
        msg_info!(Message::NextOccurrenceScheduled(format_timestamp(next.due_at)));
    }
}

fn handle_edit(id: &str, mut patch: TaskPatch, category: Option<String>, clear_category: bool) -> Result<()> {
    let db = open_db()?;
    let task = resolve_task(&db, id)?;

    if clear_category {
        patch.category_id = Some(None);
    } else if let Some(category) = category {
        patch.category_id = Some(Some(resolve_category(&db, &category)?.id));
    }

    if patch.is_empty() {
        msg_info!(Message::NoChangesDetected);
        return Ok(());
    }

    if db.tasks().update(&task.id, &patch)? {
        msg_success!(Message::TaskUpdatedWithName(patch.title.unwrap_or(task.title)));
    } else {
        msg_bail_anyhow!(Message::TaskNotFoundWithId(id.to_string()));
    }
    Ok(())
}

fn handle_delete(ids: Vec<String>, yes: bool) -> Result<()> {
    let mut db = open_db()?;

    let mut resolved = Vec::with_capacity(ids.len());
    for id in &ids {
        resolved.push(resolve_task(&db, id)?);
    }

    if !yes {
        msg_print!(Message::TasksToBeDeleted);
        View::tasks(&resolved, &db.categories().all()?)?;
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::ConfirmDeleteTasks(resolved.len()).to_string())
            .default(false)
            .interact()?;
        if !confirmed {
            msg_info!(Message::OperationCancelled);
            return Ok(());
        }
    }

    let ids: Vec<String> = resolved.into_iter().map(|t| t.id).collect();
    let deleted = db.batch_delete_tasks(&ids)?;
    msg_success!(Message::TasksDeletedCount(deleted));
    Ok(())
}

fn handle_chain(id: &str) -> Result<()> {
    let db = open_db()?;
    let task = resolve_task(&db, id)?;

    let chain = db.tasks().fetch(&TaskFilter::Chain(task.chain_root().to_string()))?;
    msg_print!(Message::ChainHeader(task.title.clone()), true);
    View::tasks(&chain, &db.categories().all()?)?;
    Ok(())
}

fn parse_date_arg(value: &str) -> Result<i64> {
    match parse_datetime(value) {
        Some(millis) => Ok(millis),
        None => msg_bail_anyhow!(Message::InvalidDate(value.to_string())),
    }
}

/// Rejects rules the recurrence engine could not expand later.
fn check_rule(rule: &str) -> Result<String> {
    match rule.parse::<RepeatRule>() {
        Ok(parsed) => Ok(parsed.to_string()),
        Err(e) => msg_bail_anyhow!(Message::InvalidRepeatRule(rule.to_string(), e.to_string())),
    }
}
