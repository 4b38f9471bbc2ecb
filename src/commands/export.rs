use super::open_db;
use crate::{
    libs::{
        config::Config,
        export::{ExportFormat, Exporter},
        messages::Message,
    },
    msg_info,
};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[arg(short, long, value_enum, default_value = "json")]
    format: ExportFormat,

    /// Output file; defaults to a timestamped name in the export directory
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub async fn cmd(args: ExportArgs) -> Result<()> {
    let config = Config::read()?;
    let mut db = open_db()?;

    msg_info!(Message::ExportingData(format!("{:?}", args.format)));

    let exporter = Exporter::new(args.format, args.output, config.export_dir.as_deref());
    exporter.export(&mut db)?;

    Ok(())
}
