//! Tracing subscriber installation.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Errors returned while installing the tracing subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directives do not parse.
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// Rejected directives.
        filter: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("failed to initialise tracing subscriber: {0}")]
    Initialisation(String),
}

/// Builds the filter described by `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] when the directives do not
/// parse.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.filter).map_err(|err| TelemetryError::InvalidFilter {
        filter: config.filter.clone(),
        reason: err.to_string(),
    })
}

/// Installs a formatted subscriber filtered by `config` as the global
/// default.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a subscriber is
/// already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(config)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|err| TelemetryError::Initialisation(err.to_string()))
}
