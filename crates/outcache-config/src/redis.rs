//! Redis connection settings.
//!
//! # Environment Variables
//!
//! - `REDIS_HOST`: redis host, or cluster seed host (default: `127.0.0.1`)
//! - `REDIS_PORT`: redis port (default: `6379`)
//! - `REDIS_CLUSTER`: connect in cluster mode (default: `false`)
//! - `REDIS_ATTEMPTS`: reconnect retries per operation (default: `3`)
//! - `REDIS_RETRY_BASE_DELAY_MS`: first reconnect delay (default: `100`)
//! - `REDIS_RETRY_MAX_DELAY_MS`: reconnect delay ceiling (default: `10000`)
//! - `REDIS_HEALTH_CHECK_INTERVAL_SECS`: readiness check interval (default: `5`)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

use crate::{ConfigError, Source, var_or};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_backoff"))]
pub struct RedisConfig {
    #[validate(length(min = 1))]
    pub host: String,

    #[validate(range(min = 1))]
    pub port: u16,

    /// Treat `host:port` as the seed node of a redis cluster.
    pub cluster: bool,

    #[validate(range(max = 100))]
    pub attempts: usize,

    #[validate(range(min = 1))]
    pub retry_base_delay_ms: u64,

    pub retry_max_delay_ms: u64,

    #[validate(range(min = 1))]
    pub health_check_interval_secs: u64,
}

impl RedisConfig {
    pub fn from_source(source: &Source<'_>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: source("REDIS_HOST").unwrap_or(defaults.host),
            port: var_or(source, "REDIS_PORT", defaults.port)?,
            cluster: var_or(source, "REDIS_CLUSTER", defaults.cluster)?,
            attempts: var_or(source, "REDIS_ATTEMPTS", defaults.attempts)?,
            retry_base_delay_ms: var_or(
                source,
                "REDIS_RETRY_BASE_DELAY_MS",
                defaults.retry_base_delay_ms,
            )?,
            retry_max_delay_ms: var_or(
                source,
                "REDIS_RETRY_MAX_DELAY_MS",
                defaults.retry_max_delay_ms,
            )?,
            health_check_interval_secs: var_or(
                source,
                "REDIS_HEALTH_CHECK_INTERVAL_SECS",
                defaults.health_check_interval_secs,
            )?,
        })
    }

    /// `redis://host:port/`
    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }

    /// `host:port`, used as log context.
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Delay before reconnect attempt number `attempt` (zero based).
    ///
    /// Grows exponentially from `retry_base_delay_ms` and never exceeds
    /// `retry_max_delay_ms`.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay = self.retry_base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.retry_max_delay_ms))
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 6379,
            cluster: false,
            attempts: 3,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 10_000,
            health_check_interval_secs: 5,
        }
    }
}

fn validate_backoff(config: &RedisConfig) -> Result<(), ValidationError> {
    if config.retry_max_delay_ms < config.retry_base_delay_ms {
        return Err(ValidationError::new("retry_max_delay_ms")
            .with_message("retry max delay must not be below the base delay".into()));
    }
    Ok(())
}
