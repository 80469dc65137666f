//! Configuration management for the SQLite datastore.

use datastore_engine::{config::ConfigError as EngineConfigError, EngineConfig};
use std::env;

/// Datastore configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL, e.g. `sqlite://datastore.db`
    pub database_url: String,
    /// Pool size
    pub max_connections: u32,
    /// Engine settings (namespace, change feed, hydration checks)
    pub engine: EngineConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "4".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidMaxConnections)?;

        let engine = EngineConfig::from_env()?;

        Ok(Self {
            database_url,
            max_connections,
            engine,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid DATABASE_MAX_CONNECTIONS value")]
    InvalidMaxConnections,

    #[error(transparent)]
    Engine(#[from] EngineConfigError),
}
