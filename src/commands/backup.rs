use super::open_db;
use crate::{
    libs::{config::Config, messages::Message},
    msg_success,
};
use anyhow::Result;
use chrono::Local;
use clap::Args;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct BackupArgs {
    /// Output file; defaults to `tasknest_backup_<timestamp>.json` in the export directory
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub async fn cmd(args: BackupArgs) -> Result<()> {
    let config = Config::read()?;
    let mut db = open_db()?;

    let output = args.output.unwrap_or_else(|| {
        let file_name = format!("tasknest_backup_{}.json", Local::now().format("%Y%m%d_%H%M%S"));
        match &config.export_dir {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    });
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let snapshot = db.backup()?;
    fs::write(&output, serde_json::to_string_pretty(&snapshot)?)?;

    msg_success!(Message::BackupWritten(
        output.display().to_string(),
        snapshot.tasks.len(),
        snapshot.categories.len()
    ));
    Ok(())
}
