//! # Outcache Config
//!
//! Configuration types for the outcache response cache.
//!
//! Every structure is loaded from environment variables and then validated
//! with the `validator` crate. Unlike a best-effort loader, a malformed or
//! out-of-range value is an error: the cache must not start misconfigured.
//!
//! - [`cache`]: key derivation and expiry options consumed by the cache core
//! - [`redis`]: connection and reconnect settings for the redis store
//!
//! # Example
//!
//! ```ignore
//! use outcache_config::CacheConfig;
//!
//! let config = CacheConfig::from_env()?;
//! println!("partition = {}", config.options.partition);
//! ```

pub mod cache;
pub mod error;
pub mod redis;

pub use cache::{CacheOptions, ParentKeyRule};
pub use error::ConfigError;
pub use redis::RedisConfig;

use std::env;
use std::str::FromStr;
use validator::Validate;

/// Complete cache configuration: core options plus store connection settings.
#[derive(Clone, Debug, Default, Validate)]
pub struct CacheConfig {
    #[validate(nested)]
    pub options: CacheOptions,

    #[validate(nested)]
    pub redis: RedisConfig,
}

impl CacheConfig {
    /// Load and validate the whole configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidVar`] when a variable cannot be parsed
    /// and [`ConfigError::Validation`] when a parsed value breaks a rule.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&|var| env::var(var).ok())
    }

    /// Load and validate the configuration from an arbitrary variable source.
    pub fn from_source(source: &Source<'_>) -> Result<Self, ConfigError> {
        let config = Self {
            options: CacheOptions::from_source(source)?,
            redis: RedisConfig::from_source(source)?,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Lookup function for configuration variables.
pub type Source<'a> = dyn Fn(&str) -> Option<String> + 'a;

/// Read `var` and parse it, falling back to `default` when it is unset.
pub(crate) fn var_or<T: FromStr>(
    source: &Source<'_>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match source(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidVar { var, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_source_rejects_bad_values() {
        let vars = HashMap::from([("CACHE_EXPIRES_IN", "0".to_string())]);
        let result = CacheConfig::from_source(&|var| vars.get(var).cloned());
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        let vars = HashMap::from([("REDIS_PORT", "not-a-port".to_string())]);
        let result = CacheConfig::from_source(&|var| vars.get(var).cloned());
        assert!(matches!(
            result,
            Err(ConfigError::InvalidVar { var: "REDIS_PORT", .. })
        ));
    }

    #[test]
    fn test_nested_errors_surface() {
        let mut config = CacheConfig::default();
        config.options.expires_in = 0;
        config.redis.host = String::new();

        let errors = config.validate().unwrap_err();
        assert!(errors.errors().contains_key("options"));
        assert!(errors.errors().contains_key("redis"));
    }
}
