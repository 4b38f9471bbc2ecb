pub mod backup;
pub mod category;
pub mod export;
pub mod health;
pub mod import;
pub mod migrations;
pub mod restore;
pub mod setting;
pub mod task;

use crate::{
    db::{categories::Category, db::Db},
    libs::{config::Config, messages::Message, task::Task},
    msg_bail_anyhow, msg_error_anyhow,
};
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Manage tasks")]
    Task(task::TaskArgs),
    #[command(about = "Manage categories")]
    Category(category::CategoryArgs),
    #[command(about = "Read and write settings")]
    Setting(setting::SettingArgs),
    #[command(about = "Export data to a file")]
    Export(export::ExportArgs),
    #[command(about = "Import data from a snapshot file")]
    Import(import::ImportArgs),
    #[command(about = "Write a full backup of the database")]
    Backup(backup::BackupArgs),
    #[command(about = "Restore the database from a backup")]
    Restore(restore::RestoreArgs),
    #[command(about = "Schema version and migration history")]
    Migrations(migrations::MigrationsArgs),
    #[command(about = "Check the database for problems")]
    Health,
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help(true))]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub async fn menu() -> Result<()> {
        let cli = Self::parse();
        match cli.command {
            Commands::Task(args) => task::cmd(args).await,
            Commands::Category(args) => category::cmd(args).await,
            Commands::Setting(args) => setting::cmd(args).await,
            Commands::Export(args) => export::cmd(args).await,
            Commands::Import(args) => import::cmd(args).await,
            Commands::Backup(args) => backup::cmd(args).await,
            Commands::Restore(args) => restore::cmd(args).await,
            Commands::Migrations(args) => migrations::cmd(args),
            Commands::Health => health::cmd(),
        }
    }
}

/// Opens the configured database, fully migrated.
pub(crate) fn open_db() -> Result<Db> {
    Db::new().map_err(|e| msg_error_anyhow!(Message::StoreOpenFailed(e.to_string())))
}

/// Opens the configured database without applying pending migrations.
pub(crate) fn open_db_without_migrations() -> Result<Db> {
    let config = Config::read()?;
    let path = config.database_path()?;
    let db = Db::open_without_migrations(&path).map_err(|e| msg_error_anyhow!(Message::StoreOpenFailed(e.to_string())))?;
    Ok(db.with_lock_config(config.lock))
}

/// Finds a task by full id or by an unambiguous id prefix.
pub(crate) fn resolve_task(db: &Db, id: &str) -> Result<Task> {
    if let Some(task) = db.tasks().get(id)? {
        return Ok(task);
    }

    let mut matches: Vec<Task> = db.tasks().all()?.into_iter().filter(|t| t.id.starts_with(id)).collect();
    match matches.len() {
        0 => msg_bail_anyhow!(Message::TaskNotFoundWithId(id.to_string())),
        1 => Ok(matches.remove(0)),
        n => msg_bail_anyhow!(Message::TaskIdAmbiguous(id.to_string(), n)),
    }
}

/// Finds a category by id or by name.
pub(crate) fn resolve_category(db: &Db, identifier: &str) -> Result<Category> {
    let categories = db.categories();
    if let Some(category) = categories.get(identifier)? {
        return Ok(category);
    }
    match categories.get_by_name(identifier)? {
        Some(category) => Ok(category),
        None => msg_bail_anyhow!(Message::CategoryNotFound(identifier.to_string())),
    }
}
