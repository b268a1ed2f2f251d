//! `appraisal settings`: System settings.

use clap::Subcommand;

use crate::session::{CliResult, GlobalOpts, Session};

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Show one setting, or all of them
    Get { key: Option<String> },

    /// Change a setting (admin only)
    Set { key: String, value: String },
}

pub async fn run(opts: &GlobalOpts, command: SettingsCommand) -> CliResult {
    let session = Session::open(opts).await?;
    let ctx = session.identity(opts).await?;
    let desk = &session.desk;

    match command {
        SettingsCommand::Get { key: Some(key) } => match desk.setting(&ctx, &key).await? {
            Some(value) => println!("{key} = {value}"),
            None => println!("   Unknown setting: {key}"),
        },
        SettingsCommand::Get { key: None } => {
            println!("⚙️  Settings");
            for (key, value) in desk.all_settings(&ctx).await? {
                println!("  {key:<18} {value}");
            }
        }
        SettingsCommand::Set { key, value } => {
            desk.update_setting(&ctx, &key, &value).await?;
            println!("✅ {key} = {}", value.trim());
        }
    }
    Ok(())
}
