use super::open_db;
use crate::{
    db::backup::DbSnapshot,
    libs::messages::Message,
    msg_bail_anyhow, msg_info, msg_success,
};
use anyhow::{Context, Result};
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Backup file written by `backup`
    file: PathBuf,

    /// Skip the confirmation
    #[arg(short, long)]
    yes: bool,
}

pub async fn cmd(args: RestoreArgs) -> Result<()> {
    let content = fs::read_to_string(&args.file).with_context(|| format!("failed to read {}", args.file.display()))?;
    let snapshot: DbSnapshot =
        serde_json::from_str(&content).with_context(|| format!("{} is not a backup file", args.file.display()))?;

    if !args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::ConfirmRestore(snapshot.tasks.len(), snapshot.categories.len()).to_string())
            .default(false)
            .interact()?;
        if !confirmed {
            msg_info!(Message::OperationCancelled);
            return Ok(());
        }
    }

    let mut db = open_db()?;
    if db.restore(&snapshot)? {
        msg_success!(Message::RestoreCompleted(
            snapshot.tasks.len(),
            snapshot.categories.len(),
            snapshot.settings.len()
        ));
        Ok(())
    } else {
        msg_bail_anyhow!(Message::RestoreFailed(args.file.display().to_string()))
    }
}
