//! # Tasknest - local-first task manager
//!
//! Tasks, categories and settings kept in an embedded SQLite file, with
//! recurring tasks, a versioned schema, snapshot backup/restore and JSON
//! export/import.
//!
//! ## Features
//!
//! - **Versioned storage**: schema versions applied in order on open, with a
//!   persisted migration history
//! - **Recurrence**: completing a repeating task schedules its next occurrence
//! - **Atomic operations**: multi-store transactions, batch updates and an
//!   advisory lock shared between processes
//! - **Backup and import**: id-preserving snapshots and id-remapping imports
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasknest::db::db::Db;
//! use tasknest::libs::task::{NewTask, TaskStatus};
//!
//! let db = Db::open_in_memory()?;
//! let task = db.tasks().create(&NewTask::new("Standup").repeat("FREQ=DAILY").due_at(1_736_931_600_000))?;
//! let change = db.set_task_status(&task.id, TaskStatus::Done)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod commands;
pub mod db;
pub mod libs;
