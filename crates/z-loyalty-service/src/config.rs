//! Service configuration.

use std::time::Duration;

use z_loyalty_engine::EngineConfig;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// PostgreSQL connection string (`DATABASE_URI`, required).
    pub database_uri: String,

    /// Base URL of the external accrual service
    /// (`ACCRUAL_SYSTEM_ADDRESS`, default `http://localhost:8080`).
    pub accrual_address: String,

    /// Reconciliation engine settings.
    pub engine: EngineConfig,
}

/// Errors produced while loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URI` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_uri =
            std::env::var("DATABASE_URI").map_err(|_| ConfigError::MissingVar("DATABASE_URI"))?;

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            poll_interval: env_duration_secs("POLL_INTERVAL_SECONDS", defaults.poll_interval),
            workers: env_parse("WORKER_COUNT", defaults.workers),
            queue_capacity: env_parse("QUEUE_CAPACITY", defaults.queue_capacity),
            ..defaults
        };

        Ok(Self {
            database_uri,
            accrual_address: std::env::var("ACCRUAL_SYSTEM_ADDRESS")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
            engine,
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_duration_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .map_or(default, Duration::from_secs)
}
