//! Reminder side-channel.
//!
//! Delivery of notifications lives outside this crate. The task store only
//! hands a scheduler the `{task_id, title, due_at}` triple to arm a reminder
//! and a task id to cancel one.

use crate::libs::formatter::now_millis;
use crate::libs::messages::Message;
use crate::libs::task::{Task, TaskStatus};
use crate::msg_debug;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub task_id: String,
    pub title: String,
    pub due_at: i64,
}

impl Reminder {
    /// A reminder worth arming: the task is pending and due in the future.
    pub fn for_task(task: &Task) -> Option<Reminder> {
        if task.status != TaskStatus::Pending {
            return None;
        }
        let due_at = task.due_at.filter(|due| *due > now_millis())?;
        Some(Reminder {
            task_id: task.id.clone(),
            title: task.title.clone(),
            due_at,
        })
    }
}

pub trait ReminderScheduler: Send + Sync {
    fn schedule(&self, reminder: Reminder);
    fn cancel(&self, task_id: &str);
}

/// Drops every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReminders;

impl ReminderScheduler for NoopReminders {
    fn schedule(&self, _reminder: Reminder) {}
    fn cancel(&self, _task_id: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderCommand {
    Schedule(Reminder),
    Cancel(String),
}

/// Forwards requests to a background consumer over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelReminders {
    tx: mpsc::UnboundedSender<ReminderCommand>,
}

impl ChannelReminders {
    pub fn new(tx: mpsc::UnboundedSender<ReminderCommand>) -> Self {
        Self { tx }
    }

    /// Scheduler plus the receiving end for the consumer.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ReminderCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, command: ReminderCommand) {
        // A closed channel only means nobody is listening any more.
        if self.tx.send(command).is_err() {
            msg_debug!(Message::ReminderChannelClosed);
        }
    }
}

impl ReminderScheduler for ChannelReminders {
    fn schedule(&self, reminder: Reminder) {
        self.send(ReminderCommand::Schedule(reminder));
    }

    fn cancel(&self, task_id: &str) {
        self.send(ReminderCommand::Cancel(task_id.to_string()));
    }
}
