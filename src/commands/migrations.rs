use super::open_db_without_migrations;
use crate::{
    db::{
        migrations::{needs_migration, MigrationManager},
        schema::find_version,
    },
    libs::{messages::Message, view::View},
    msg_bail_anyhow, msg_info, msg_print, msg_success,
};
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct MigrationsArgs {
    #[command(subcommand)]
    command: MigrationsCommand,
}

#[derive(Debug, Subcommand)]
enum MigrationsCommand {
    /// Show the schema version of the database
    Status,
    /// Show every recorded migration attempt
    History,
    /// Apply pending schema versions
    Migrate {
        /// Stop at this version instead of the latest
        #[arg(long)]
        to: Option<u32>,
    },
}

pub fn cmd(args: MigrationsArgs) -> Result<()> {
    let mut db = open_db_without_migrations()?;
    let manager = MigrationManager::new();

    match args.command {
        MigrationsCommand::Status => {
            let version = db.version()?;
            let name = find_version(version).map(|v| v.name).unwrap_or("empty");
            msg_print!(Message::DatabaseVersion(version, name.to_string()));
            if needs_migration(&db.conn)? {
                msg_info!(Message::DatabaseNeedsUpdate(manager.latest_version()));
            } else {
                msg_info!(Message::DatabaseUpToDate(version));
            }
        }
        MigrationsCommand::History => {
            let history = db.migration_history()?;
            if history.is_empty() {
                msg_info!(Message::NoMigrationHistory);
            } else {
                msg_print!(Message::MigrationHistory, true);
                View::migration_history(&history)?;
            }
        }
        MigrationsCommand::Migrate { to } => {
            if db.migrate(to)? {
                msg_success!(Message::AllMigrationsCompleted(db.version()?));
            } else {
                msg_bail_anyhow!(Message::MigrationStopped(db.version()?));
            }
        }
    }

    Ok(())
}
