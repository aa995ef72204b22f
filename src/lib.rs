//! # Outcache
//!
//! An HTTP API whose read endpoints are cached in redis by the
//! `outcache-cache` middleware.
//!
//! ## Architecture
//!
//! ```text
//! crates/
//! ├── outcache-config/         # Cache and redis settings, validated
//! ├── outcache-cache/          # Keys, interceptors, stores, middleware
//! └── outcache-observability/  # Tracing and Prometheus metrics
//! src/
//! ├── config/                  # CLI arguments and CORS
//! ├── modules/articles/        # Sample resource served through the cache
//! └── utils/                   # Shared error type
//! ```
//!
//! ## Caching behaviour
//!
//! - `GET /api/articles` and `GET /api/articles/{id}` are answered from the
//!   cache when a `200` response for the same key is stored.
//! - `PUT` and `DELETE` on `/api/articles/{id}` evict the article and the
//!   listing.
//! - A `5xx` response is replaced by the stored copy when one was loaded.
//! - When redis is unreachable requests go straight to the handlers.
//!
//! ## Environment Variables
//!
//! ```bash
//! BIND_ADDR=0.0.0.0:3000
//! CACHE_BACKEND=redis
//! CACHE_PARTITION=default
//! CACHE_VARY_BY_HEADERS=accept,accept-language
//! CACHE_EXPIRES_IN=60
//! REDIS_HOST=127.0.0.1
//! REDIS_PORT=6379
//! ```

pub mod config;
pub mod modules;
pub mod router;
pub mod state;
pub mod utils;

pub use outcache_cache;
pub use outcache_config;
