//! Configuration management.
//!
//! Values come from an optional file and from `GATEKEEPER__SECTION__KEY`
//! environment variables, e.g. `GATEKEEPER__AUTHZ__CHECK_USER_BLOCKS=false`.

use serde::Deserialize;
use std::time::Duration;

use crate::error::{GatekeeperError, Result};
use crate::logging::LoggingConfig;

const ENV_PREFIX: &str = "GATEKEEPER";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Authorization engine configuration
    #[serde(default)]
    pub authz: AuthzConfig,

    /// Database configuration; absent when running against an in-memory store
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Per-request authorization behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthzConfig {
    /// Deny every verb to actors with an active block
    #[serde(default = "default_check_user_blocks")]
    pub check_user_blocks: bool,

    /// Log computed decisions at info instead of debug
    #[serde(default)]
    pub log_decisions: bool,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            check_user_blocks: default_check_user_blocks(),
            log_decisions: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Seconds to wait for a free connection
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

// Default value functions
fn default_check_user_blocks() -> bool { true }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_acquire_timeout_secs() -> u64 { 5 }

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides on top.
    pub fn from_file(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would only fail later at connection time.
    pub fn validate(&self) -> Result<()> {
        if let Some(db) = &self.database {
            if db.url.trim().is_empty() {
                return Err(GatekeeperError::configuration("database.url is empty"));
            }
            if db.min_connections > db.max_connections {
                return Err(GatekeeperError::configuration(format!(
                    "database.min_connections ({}) exceeds database.max_connections ({})",
                    db.min_connections, db.max_connections
                )));
            }
        }
        Ok(())
    }
}
