//! Configuration view and validation commands: `civic-watch config`.

use anyhow::{Context, Result};
use std::path::Path;

use civic_watch::config::{CONFIG_FILE, CivicToml};

use super::super::ConfigCommands;

pub fn cmd_config(config_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            if config_path.exists() {
                println!("# Config file: {}", config_path.display());
            } else {
                println!("# No {} found, using defaults", CONFIG_FILE);
            }
            let mut config = CivicToml::load_or_default(config_dir)?;
            config.apply_env()?;
            println!("# Effective values (with environment overrides)");
            println!();
            print!(
                "{}",
                toml::to_string_pretty(&config).context("Failed to render configuration")?
            );
        }
        Some(ConfigCommands::Validate) => {
            let config = CivicToml::load_or_default(config_dir)?;
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("{} already exists at {}", CONFIG_FILE, config_path.display());
                return Ok(());
            }
            std::fs::create_dir_all(config_dir).with_context(|| {
                format!("Failed to create config directory: {}", config_dir.display())
            })?;
            CivicToml::default().save(&config_path)?;
            println!("Created {}", config_path.display());
        }
    }

    Ok(())
}
