use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use civic_watch::config::CivicToml;
use civic_watch::telemetry;

mod cmd;

#[derive(Parser)]
#[command(name = "civic-watch")]
#[command(version, about = "Civic issue reporting service")]
pub struct Cli {
    /// Directory containing civic.toml (defaults to the current directory)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Interface to bind
        #[arg(long)]
        host: Option<String>,

        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (CORS permissive for a locally served dashboard)
        #[arg(long)]
        dev: bool,
    },
    /// Create or migrate the database, then exit
    InitDb {
        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Manage reporter accounts
    User {
        /// Database path
        #[arg(long, global = true)]
        db_path: Option<PathBuf>,

        #[command(subcommand)]
        command: UserCommands,
    },
    /// View, validate or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum UserCommands {
    /// Register an account and print a one-time auth code
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// citizen or admin
        #[arg(long, default_value = "citizen")]
        role: String,
    },
    /// Print a fresh one-time auth code for an existing account
    Login {
        #[arg(long)]
        email: String,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default civic.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config_dir = match cli.config_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    if let Commands::Config { command } = &cli.command {
        return cmd::cmd_config(&config_dir, command.clone());
    }

    let mut config = CivicToml::load_or_default(&config_dir)?;
    config.apply_env()?;
    let _log_guard = telemetry::init_tracing(&config.logging)?;

    match cli.command {
        Commands::Serve {
            port,
            host,
            db_path,
            dev,
        } => {
            cmd::cmd_serve(
                &config,
                cmd::ServeOverrides {
                    port,
                    host,
                    db_path,
                    dev,
                },
            )
            .await?;
        }
        Commands::InitDb { db_path } => {
            let db_path = db_path.unwrap_or_else(|| config.database.path.clone());
            cmd::cmd_init_db(&db_path)?;
        }
        Commands::User { db_path, command } => {
            let db_path = db_path.unwrap_or_else(|| config.database.path.clone());
            cmd::cmd_user(&db_path, command).await?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}
