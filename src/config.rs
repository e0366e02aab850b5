//! Service configuration read from `civic.toml`.
//!
//! Settings are layered: file → environment → CLI flags. The environment
//! layer is applied after `dotenvy` has loaded any `.env` file.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! dev_mode = false
//!
//! [database]
//! path = ".civic/civic.db"
//!
//! [logging]
//! level = "info"
//! format = "pretty"   # or "json"
//! file = "logs/civic.log"
//!
//! [map]
//! latitude = 28.6139
//! longitude = 77.209
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::civic::geo::{Coordinates, DEFAULT_MAP_CENTER};
use crate::civic::server::ServerConfig;

pub const CONFIG_FILE: &str = "civic.toml";

pub const ENV_PORT: &str = "CIVIC_PORT";
pub const ENV_DB_PATH: &str = "CIVIC_DB_PATH";
pub const ENV_LOG: &str = "CIVIC_LOG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS for a locally served dashboard
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".civic/civic.db")
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// `EnvFilter` directive, e.g. "info" or "civic_watch=debug,tower_http=info"
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Also write logs to this file (daily rotation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

/// Default map center handed to dashboards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MapSection {
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
}

fn default_latitude() -> f64 {
    DEFAULT_MAP_CENTER.latitude
}

fn default_longitude() -> f64 {
    DEFAULT_MAP_CENTER.longitude
}

impl Default for MapSection {
    fn default() -> Self {
        Self {
            latitude: default_latitude(),
            longitude: default_longitude(),
        }
    }
}

impl MapSection {
    pub fn center(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CivicToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub map: MapSection,
}

impl CivicToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse civic.toml")
    }

    /// Load `civic.toml` from `dir`, or defaults if the file doesn't exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize civic.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `CIVIC_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("{} must be a port number, got '{}'", ENV_PORT, port))?;
        }
        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.trim().is_empty()) {
            self.database.path = PathBuf::from(path);
        }
        if let Some(level) = lookup(ENV_LOG).filter(|l| !l.trim().is_empty()) {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(e) = self.map.center().validate() {
            warnings.push(format!("Invalid [map] center: {}", e));
        }
        if self.server.port == 0 {
            warnings.push("[server] port 0 binds a random port".to_string());
        }
        if self.server.dev_mode && self.server.host == "0.0.0.0" {
            warnings.push("dev_mode with host 0.0.0.0 exposes permissive CORS to the network".to_string());
        }

        warnings
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            db_path: self.database.path.clone(),
            dev_mode: self.server.dev_mode,
            map_center: self.map.center(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = CivicToml::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert!(!config.server.dev_mode);
        assert_eq!(config.database.path, PathBuf::from(".civic/civic.db"));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.logging.file.is_none());
        assert_eq!(config.map.center(), DEFAULT_MAP_CENTER);
    }

    #[test]
    fn test_parse_partial_file() {
        let content = r#"
[server]
port = 9000

[logging]
format = "json"
"#;
        let config = CivicToml::parse(content).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_rejects_bad_toml() {
        assert!(CivicToml::parse("[server\nport = ").is_err());
        assert!(CivicToml::parse("[logging]\nformat = \"xml\"").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = CivicToml::default();
        config.server.port = 4000;
        config.map.latitude = 51.5;
        config.logging.file = Some(PathBuf::from("logs/civic.log"));
        config.save(&path).unwrap();

        let loaded = CivicToml::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded.server.port, 4000);
        assert_eq!(loaded.map.latitude, 51.5);
        assert_eq!(loaded.logging.file, Some(PathBuf::from("logs/civic.log")));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let config = CivicToml::load_or_default(dir.path()).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_env_overrides_file() {
        let vars: HashMap<&str, &str> = [
            (ENV_PORT, "9100"),
            (ENV_DB_PATH, "/tmp/civic-env.db"),
            (ENV_LOG, "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = CivicToml::parse("[server]\nport = 9000").unwrap();
        config
            .apply_env_with(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.database.path, PathBuf::from("/tmp/civic-env.db"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_env_bad_port_is_error() {
        let mut config = CivicToml::default();
        let result = config.apply_env_with(|k| (k == ENV_PORT).then(|| "eighty".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_warns_on_bad_center() {
        let mut config = CivicToml::default();
        assert!(config.validate().is_empty());
        config.map.latitude = 120.0;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("[map]"));
    }

    #[test]
    fn test_server_config_mapping() {
        let mut config = CivicToml::default();
        config.server.dev_mode = true;
        config.database.path = PathBuf::from("data/x.db");
        let server = config.server_config();
        assert!(server.dev_mode);
        assert_eq!(server.db_path, PathBuf::from("data/x.db"));
        assert_eq!(server.map_center, DEFAULT_MAP_CENTER);
    }
}
