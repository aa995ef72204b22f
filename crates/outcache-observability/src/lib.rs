//! Outcache Observability
//!
//! Logging and metrics shared by the server:
//! - Structured tracing to the console and to daily-rolled files
//! - Prometheus metrics with an HTTP request middleware
//! - A per-request logging middleware tagging every request with an id
//!
//! Both can be switched off at runtime with `OBSERVABILITY_ENABLED=false`,
//! in which case only console logging remains.
//!
//! # Examples
//!
//! ```no_run
//! use outcache_observability::{init_metrics, init_tracing};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     init_tracing()?;
//!     let handle = init_metrics()?;
//!     // ... application code ...
//!     Ok(())
//! }
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_tracing, logging_middleware};
pub use metrics::{init_metrics, is_observability_enabled, metrics_middleware, metrics_router};
pub use metrics_exporter_prometheus::PrometheusHandle;
