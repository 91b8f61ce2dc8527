//! Process settings read from the environment.

use crate::config::AccessConfig;
use crate::error::ConfigError;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    pub max_connections: u32,
    /// When set, exposure rules come from this file instead of the environment.
    pub access_config_path: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
        let max_connections = match std::env::var("DB_MAX_CONNECTIONS") {
            Ok(v) => v
                .parse()
                .map_err(|_| ConfigError::Parse(format!("DB_MAX_CONNECTIONS: '{}' is not a number", v)))?,
            Err(_) => 5,
        };
        let access_config_path = std::env::var("ACCESS_CONFIG_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        Ok(Settings {
            database_url,
            bind_addr,
            max_connections,
            access_config_path,
        })
    }

    pub async fn access_config(&self) -> Result<AccessConfig, ConfigError> {
        match &self.access_config_path {
            Some(path) => AccessConfig::load(path).await,
            None => Ok(AccessConfig::from_env()),
        }
    }
}
