//! Service commands: `civic-watch serve` and `civic-watch init-db`.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::warn;

use civic_watch::civic::server::{self, ServerConfig};
use civic_watch::config::CivicToml;

/// Command-line flags that take precedence over file and environment.
pub struct ServeOverrides {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub db_path: Option<PathBuf>,
    pub dev: bool,
}

pub fn resolve_server_config(config: &CivicToml, overrides: ServeOverrides) -> ServerConfig {
    let mut server = config.server_config();
    if let Some(port) = overrides.port {
        server.port = port;
    }
    if let Some(host) = overrides.host {
        server.host = host;
    }
    if let Some(db_path) = overrides.db_path {
        server.db_path = db_path;
    }
    server.dev_mode |= overrides.dev;
    server
}

pub async fn cmd_serve(config: &CivicToml, overrides: ServeOverrides) -> Result<()> {
    for warning in config.validate() {
        warn!("{}", warning);
    }
    server::start_server(resolve_server_config(config, overrides)).await
}

pub fn cmd_init_db(db_path: &Path) -> Result<()> {
    server::open_database(db_path)?;
    println!("Civic database initialized at {}", db_path.display());
    Ok(())
}
