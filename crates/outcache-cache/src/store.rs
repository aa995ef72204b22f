//! Key-value store abstraction the interceptors talk to.
//!
//! A single store handle is built once at startup and shared by every
//! in-flight request as `Arc<dyn CacheStore>`. Implementations do their own
//! connection multiplexing, so the handle needs no external locking.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Failure of a store operation.
///
/// No variant is ever surfaced to an HTTP client: the interceptors log
/// the error and carry on as if the request were uncached.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cache store {target} is not ready")]
    Unavailable { target: String },

    #[error("{operation} on {target} failed for key {key}: {message}")]
    Operation {
        operation: &'static str,
        key: String,
        target: String,
        message: String,
    },

    #[error("{operation} is not supported by {target}")]
    Unsupported {
        operation: &'static str,
        target: String,
    },
}

impl StoreError {
    pub fn operation(
        operation: &'static str,
        key: impl Into<String>,
        target: impl Into<String>,
        err: impl fmt::Display,
    ) -> Self {
        Self::Operation {
            operation,
            key: key.into(),
            target: target.into(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Whether the store is connected and accepting commands.
    fn is_ready(&self) -> bool;

    /// Human readable endpoint, used as log context.
    fn target(&self) -> String;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Delete every key as one batch. Either the whole batch is submitted or
    /// an error is returned and none of it counts as applied.
    async fn delete_many(&self, keys: &[String]) -> Result<(), StoreError>;

    /// Delete every key starting with `prefix`, returning how many went.
    ///
    /// Not atomic: keys written while the sweep runs may survive it.
    async fn delete_prefixed(&self, prefix: &str) -> Result<u64, StoreError>;
}
