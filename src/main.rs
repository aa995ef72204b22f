use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use outcache::config::cors::CorsConfig;
use outcache::config::server::{Backend, ServerArgs};
use outcache::router::init_router;
use outcache::state::AppState;
use outcache_cache::{CacheStore, MemoryStore, OutputCache, RedisStore};
use outcache_config::CacheConfig;
use outcache_observability::{init_metrics, init_tracing};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = ServerArgs::parse();

    init_tracing()?;
    let metrics = init_metrics()?;

    let config = CacheConfig::from_env().context("Invalid cache configuration")?;

    let store: Arc<dyn CacheStore> = match args.backend {
        Backend::Redis => Arc::new(
            RedisStore::connect(config.redis.clone()).context("Invalid redis configuration")?,
        ),
        Backend::Memory => Arc::new(MemoryStore::new()),
    };
    info!(
        backend = ?args.backend,
        cache.target = %store.target(),
        cache.partition = %config.options.partition,
        cache.ttl_secs = config.options.expires_in,
        "Cache configured"
    );

    let state = AppState::new(OutputCache::new(store, config.options), CorsConfig::from_env());
    let app = init_router(state, metrics);

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!(bind = %args.bind, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
