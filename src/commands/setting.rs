use super::open_db;
use crate::{
    db::settings::is_internal_key,
    libs::{messages::Message, view::View},
    msg_bail_anyhow, msg_info, msg_print, msg_success,
};
use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::Value;

#[derive(Debug, Args)]
pub struct SettingArgs {
    #[command(subcommand)]
    command: SettingCommand,
}

#[derive(Debug, Subcommand)]
enum SettingCommand {
    /// Print one setting
    Get { key: String },
    /// Store a value; JSON literals are kept typed, anything else is a string
    Set { key: String, value: String },
    /// List user settings
    List,
    /// Remove a setting
    Delete { key: String },
}

pub async fn cmd(args: SettingArgs) -> Result<()> {
    let db = open_db()?;
    let settings = db.settings();

    match args.command {
        SettingCommand::Get { key } => match settings.get(&key)? {
            Some(setting) => msg_print!(Message::SettingValue(setting.key, setting.value.to_string())),
            None => msg_info!(Message::SettingNotFound(key)),
        },
        SettingCommand::Set { key, value } => {
            if is_internal_key(&key) {
                msg_bail_anyhow!(Message::SettingKeyReserved(key));
            }
            let value = serde_json::from_str::<Value>(&value).unwrap_or(Value::String(value));
            settings.put(&key, &value)?;
            msg_success!(Message::SettingSaved(key));
        }
        SettingCommand::List => {
            let all = settings.user_settings()?;
            if all.is_empty() {
                msg_info!(Message::NoSettingsFound);
            } else {
                View::settings(&all)?;
            }
        }
        SettingCommand::Delete { key } => {
            if is_internal_key(&key) {
                msg_bail_anyhow!(Message::SettingKeyReserved(key));
            }
            if settings.delete(&key)? {
                msg_success!(Message::SettingDeleted(key));
            } else {
                msg_info!(Message::SettingNotFound(key));
            }
        }
    }

    Ok(())
}
