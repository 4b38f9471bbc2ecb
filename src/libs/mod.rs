pub mod config;
pub mod data_storage;
pub mod export;
pub mod formatter;
pub mod messages;
pub mod recurrence;
pub mod reminders;
pub mod stores;
pub mod task;
pub mod view;
