//! Layered configuration loading using figment.
//!
//! Sources, highest priority last:
//! 1. Built-in defaults
//! 2. An optional TOML file
//! 3. Environment variables prefixed `TRIAL_`, with `__` separating
//!    sections (`TRIAL_DATABASE__URL` maps to `database.url`)

mod error;

pub use error::ConfigError;

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

/// Prefix of environment variables read by [`PersistenceConfig::load`].
pub const ENV_PREFIX: &str = "TRIAL_";

/// Connection settings of the `PostgreSQL` record store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL.
    pub url: String,
    /// Maximum number of pooled connections.
    pub pool_max_size: u32,
    /// Seconds to wait for a pooled connection.
    pub connection_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/trial".to_owned(),
            pool_max_size: 10,
            connection_timeout_secs: 30,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

/// Complete configuration of the persistence core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PersistenceConfig {
    /// Record store connection.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PersistenceConfig {
    /// Loads defaults, then `file` when given, then the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Figment`] when a source cannot be read or
    /// extracted, or [`ConfigError::InvalidValue`] when validation fails.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(file).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Builds the provider chain.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Checks values figment cannot check.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an empty URL, a zero pool
    /// size or a zero connection timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::invalid_value("database.url", "must not be empty"));
        }
        if self.database.pool_max_size == 0 {
            return Err(ConfigError::invalid_value(
                "database.pool_max_size",
                "must be at least 1",
            ));
        }
        if self.database.connection_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "database.connection_timeout_secs",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
