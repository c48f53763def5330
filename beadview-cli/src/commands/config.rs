//! `beadview config`: locate, print or create the viewer config.

use anyhow::{bail, Context, Result};
use clap::Subcommand;

use beadview_core::{config as viewer_config, ViewerConfig};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the config file location.
    Path,
    /// Print the effective config (file values over defaults).
    Show {
        /// Emit JSON instead of YAML.
        #[arg(long)]
        json: bool,
    },
    /// Write a config file holding the defaults.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Path => {
            let path = viewer_config::config_path().context("could not determine home directory")?;
            println!("{}", path.display());
        }
        ConfigCommand::Show { json } => {
            let config = viewer_config::load().context("failed to load viewer config")?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config).context("failed to serialize config")?
                );
            } else {
                print!(
                    "{}",
                    serde_yaml::to_string(&config).context("failed to serialize config")?
                );
            }
        }
        ConfigCommand::Init { force } => {
            let path = viewer_config::config_path().context("could not determine home directory")?;
            if path.exists() && !force {
                bail!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                );
            }
            let path = viewer_config::save(&ViewerConfig::default())
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("✓ Wrote default config to {}", path.display());
        }
    }
    Ok(())
}
