//! # Outcache Cache
//!
//! Redis-backed HTTP response caching that sits between the router and the
//! handlers.
//!
//! This crate provides:
//! - Deterministic, human readable cache keys built from the request shape
//! - A read half that answers cacheable `GET`s from the store
//! - A write half that stores `200` responses, evicts the resource and its
//!   collection on `PUT`/`DELETE`, and masks `5xx` errors with stale data
//! - Redis and in-memory stores behind one [`CacheStore`] trait
//! - An axum middleware wiring both halves around a route
//!
//! The cache is best effort throughout: a store that is down, slow or
//! returning garbage makes requests behave as if uncached.
//!
//! # Example
//!
//! ```ignore
//! use outcache_cache::{OutputCache, RedisStore, RouteCacheOptions, output_cache};
//! use outcache_config::CacheConfig;
//!
//! let config = CacheConfig::from_env()?;
//! let store = RedisStore::connect(config.redis)?;
//! let cache = OutputCache::new(Arc::new(store), config.options);
//!
//! let layer = axum::middleware::from_fn_with_state(
//!     cache.route(RouteCacheOptions::cacheable()),
//!     output_cache,
//! );
//! ```

pub mod entry;
pub mod interceptor;
pub mod keys;
pub mod memory;
mod metrics;
pub mod middleware;
pub mod redis;
pub mod request;
pub mod store;

pub use entry::{CacheEntry, EntryError, Payload};
pub use interceptor::{
    OutputCache, ReadOutcome, RequestCacheContext, RouteCacheOptions, WriteOutcome,
};
pub use keys::{KeyError, generate_cache_key, generate_del_keys, generate_del_prefixes};
pub use memory::{DEFAULT_MAX_ENTRIES, MemoryStore};
pub use middleware::{RouteCache, output_cache};
pub use self::redis::RedisStore;
pub use request::{CacheRequest, CacheResponse, QueryParams};
pub use store::{CacheStore, StoreError};
