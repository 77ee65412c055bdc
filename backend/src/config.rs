//! Configuration management for the warehouse stock ledger
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with WIMS_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

use crate::engine::{EngineConfig, ReleasePolicy};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub storage: StorageConfig,

    pub logging: LoggingConfig,

    /// Stock engine policies and page sizes
    pub engine: EngineSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; only required by the postgres backend
    #[serde(default)]
    pub url: String,

    pub max_connections: u32,

    pub min_connections: u32,

    pub acquire_timeout_secs: u64,
}

/// Where operations, stock and the ledger are persisted
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Postgres,
    /// Process-local state, lost on restart
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineSettings {
    /// What `release` does when asked to free more than is reserved
    pub release_policy: ReleasePolicy,

    /// Write a ledger entry for adjustments whose count matches on-hand
    pub record_zero_adjustments: bool,

    pub movements_default_limit: u32,

    pub movements_max_limit: u32,

    pub recent_activity_limit: u32,

    pub low_stock_limit: u32,
}

impl From<&EngineSettings> for EngineConfig {
    fn from(settings: &EngineSettings) -> Self {
        EngineConfig {
            release_policy: settings.release_policy,
            record_zero_adjustments: settings.record_zero_adjustments,
            movements_default_limit: settings.movements_default_limit,
            movements_max_limit: settings.movements_max_limit,
            recent_activity_limit: settings.recent_activity_limit,
            low_stock_limit: settings.low_stock_limit,
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("WIMS_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("storage.backend", "postgres")?
            .set_default("logging.format", "pretty")?
            .set_default("engine.release_policy", "clamp")?
            .set_default("engine.record_zero_adjustments", true)?
            .set_default("engine.movements_default_limit", 100)?
            .set_default("engine.movements_max_limit", 1000)?
            .set_default("engine.recent_activity_limit", 10)?
            .set_default("engine.low_stock_limit", 10)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (WIMS_ prefix)
            .add_source(
                Environment::with_prefix("WIMS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::Postgres && self.database.url.is_empty() {
            return Err(ConfigError::Message(
                "database.url is required when storage.backend = \"postgres\"".to_string(),
            ));
        }
        if self.engine.movements_default_limit > self.engine.movements_max_limit {
            return Err(ConfigError::Message(
                "engine.movements_default_limit exceeds engine.movements_max_limit".to_string(),
            ));
        }
        Ok(())
    }
}
