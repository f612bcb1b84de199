//! Configuration inspection.

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use lorafy_training::LorafyConfig;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration (API token redacted)
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show where configuration files are looked up
    Path,
}

pub fn execute(settings: &LorafyConfig, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show { json } => {
            let redacted = settings.redacted();
            if json {
                println!("{}", serde_json::to_string_pretty(&redacted)?);
            } else {
                print!("{}", redacted.to_toml_string()?);
            }
        }
        ConfigCommand::Path => {
            let global = LorafyConfig::default_global_path().map_or_else(
                || "(no home directory)".to_string(),
                |p| p.display().to_string(),
            );
            let local = LorafyConfig::default_local_path();
            println!("{} {}", "Global:".bold(), global);
            println!("{} {}", "Local:".bold(), local.display());
        }
    }
    Ok(())
}
