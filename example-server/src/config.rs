//! Server configuration loaded from TOML
//!
//! ```toml
//! listen = "127.0.0.1:3000"
//! seed = true
//!
//! [explorer]
//! base_path = "/db-explorer"
//!
//! [[connections]]
//! id = "main"
//! dialect = "postgres"
//! url = "postgres://localhost/app"
//! ```

use axum_db_explorer::{Dialect, ExplorerConfig};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("No connections configured; set EXPLORER_CONFIG or DATABASE_URL")]
    NoConnections,
}

/// A database the explorer should serve
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    pub id: String,
    pub dialect: Dialect,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Create and fill sample tables on every connection at startup
    #[serde(default)]
    pub seed: bool,

    #[serde(default)]
    pub explorer: ExplorerConfig,

    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

fn default_listen() -> String {
    "127.0.0.1:3000".to_string()
}

impl ServerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Single seeded Postgres connection named `main`
    pub fn from_database_url(url: String) -> Self {
        Self {
            listen: default_listen(),
            seed: true,
            explorer: ExplorerConfig::default(),
            connections: vec![ConnectionConfig {
                id: "main".to_string(),
                dialect: Dialect::Postgres,
                url,
            }],
        }
    }

    /// `EXPLORER_CONFIG` names a TOML file; otherwise `DATABASE_URL` is used
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = match std::env::var_os("EXPLORER_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => match std::env::var("DATABASE_URL") {
                Ok(url) => Self::from_database_url(url),
                Err(_) => return Err(ConfigError::NoConnections),
            },
        };

        if config.connections.is_empty() {
            return Err(ConfigError::NoConnections);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config: ServerConfig = toml::from_str(
            r#"
            [explorer]
            base_path = "/explorer"

            [[connections]]
            id = "shop"
            dialect = "mariadb"
            url = "mysql://root@localhost/shop"
            "#,
        )
        .unwrap();

        assert_eq!(config.listen, "127.0.0.1:3000");
        assert!(!config.seed);
        assert_eq!(config.explorer.base_path, "/explorer");
        assert_eq!(config.explorer.max_page_size, 500);
        assert_eq!(config.connections[0].dialect, Dialect::MySql);
    }

    #[test]
    fn test_unknown_dialect_is_rejected() {
        let result: Result<ServerConfig, _> = toml::from_str(
            r#"
            [[connections]]
            id = "x"
            dialect = "oracle"
            url = "oracle://"
            "#,
        );
        assert!(result.is_err());
    }
}
