pub mod backup;
pub mod categories;
pub mod db;
pub mod error;
pub mod migrations;
pub mod schema;
pub mod settings;
pub mod tasks;
pub mod transaction;
