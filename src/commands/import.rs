use super::open_db;
use crate::{
    libs::{
        export::{import_data, read_import_file, ImportMode},
        messages::Message,
    },
    msg_bail_anyhow, msg_info, msg_success,
};
use anyhow::Result;
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Snapshot file written by `export --format json`
    file: PathBuf,

    #[arg(short, long, value_enum, default_value = "merge")]
    mode: ImportMode,

    /// Skip the confirmation for replace imports
    #[arg(short, long)]
    yes: bool,
}

pub async fn cmd(args: ImportArgs) -> Result<()> {
    let payload = read_import_file(&args.file)?;

    if args.mode == ImportMode::Replace && !args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::ConfirmReplaceImport.to_string())
            .default(false)
            .interact()?;
        if !confirmed {
            msg_info!(Message::OperationCancelled);
            return Ok(());
        }
    }

    let mut db = open_db()?;
    match import_data(&mut db, &payload, args.mode) {
        Ok(summary) => {
            msg_success!(Message::ImportCompleted(
                summary.tasks,
                summary.categories,
                summary.settings_written,
                summary.settings_skipped
            ));
            Ok(())
        }
        Err(e) => msg_bail_anyhow!(Message::ImportFailed(e.to_string())),
    }
}
