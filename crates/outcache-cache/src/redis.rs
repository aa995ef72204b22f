//! Redis-backed [`CacheStore`].
//!
//! The connection is established by a background monitor task, so the
//! server can start while redis is down. The monitor PINGs the server at the
//! configured interval and keeps the readiness flag current; while redis is
//! unreachable it retries with a capped exponential backoff.

use async_trait::async_trait;
use outcache_config::RedisConfig;
use redis::aio::{ConnectionLike, ConnectionManager, ConnectionManagerConfig};
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::{AsyncCommands, Client, Cmd, Pipeline, RedisError, RedisFuture, RedisResult, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::store::{CacheStore, StoreError};

enum Backend {
    Single(Client),
    Cluster(ClusterClient),
}

impl Backend {
    fn open(config: &RedisConfig) -> RedisResult<Self> {
        if config.cluster {
            let client = ClusterClient::builder(vec![config.url()])
                .retries(config.attempts as u32)
                .min_retry_wait(config.retry_base_delay_ms)
                .max_retry_wait(config.retry_max_delay_ms)
                .build()?;
            Ok(Self::Cluster(client))
        } else {
            Ok(Self::Single(Client::open(config.url())?))
        }
    }

    async fn connect(&self, config: &RedisConfig) -> RedisResult<Connection> {
        match self {
            Self::Single(client) => {
                let manager_config = ConnectionManagerConfig::new()
                    .set_exponent_base(2)
                    .set_factor(config.retry_base_delay_ms)
                    .set_max_delay(config.retry_max_delay_ms)
                    .set_number_of_retries(config.attempts);
                let manager = ConnectionManager::new_with_config(client.clone(), manager_config).await?;
                Ok(Connection::Single(manager))
            }
            Self::Cluster(client) => Ok(Connection::Cluster(client.get_async_connection().await?)),
        }
    }
}

/// Either kind of multiplexed connection. Both are cheap to clone.
#[derive(Clone)]
enum Connection {
    Single(ConnectionManager),
    Cluster(ClusterConnection),
}

impl ConnectionLike for Connection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        match self {
            Self::Single(conn) => conn.req_packed_command(cmd),
            Self::Cluster(conn) => conn.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        match self {
            Self::Single(conn) => conn.req_packed_commands(cmd, offset, count),
            Self::Cluster(conn) => conn.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            Self::Single(conn) => conn.get_db(),
            Self::Cluster(conn) => conn.get_db(),
        }
    }
}

struct Inner {
    config: RedisConfig,
    target: String,
    connection: RwLock<Option<Connection>>,
    ready: AtomicBool,
}

impl Inner {
    fn mark_ready(&self, ready: bool) {
        let was_ready = self.ready.swap(ready, Ordering::SeqCst);
        match (was_ready, ready) {
            (false, true) => info!(cache.target = %self.target, "Connected."),
            (true, false) => warn!(cache.target = %self.target, "Connection to cache store lost"),
            _ => {}
        }
    }

    /// Connect if needed, then PING.
    async fn ping(&self, backend: &Backend) -> RedisResult<()> {
        let existing = self.connection.read().await.clone();
        let mut conn = match existing {
            Some(conn) => conn,
            None => {
                let conn = backend.connect(&self.config).await?;
                *self.connection.write().await = Some(conn.clone());
                conn
            }
        };

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Connection-level failures flip readiness until the next good PING.
    fn observe(&self, err: &RedisError) {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            self.mark_ready(false);
        }
    }
}

/// Redis store shared by all requests.
#[derive(Clone)]
pub struct RedisStore {
    inner: Arc<Inner>,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("target", &self.inner.target)
            .field("cluster", &self.inner.config.cluster)
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Create the store and start its connection monitor.
    ///
    /// Returns immediately; the store reports itself ready once the first
    /// PING succeeds. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the redis error when the connection parameters are invalid.
    pub fn connect(config: RedisConfig) -> Result<Self, RedisError> {
        let backend = Backend::open(&config)?;
        let inner = Arc::new(Inner {
            target: config.target(),
            config,
            connection: RwLock::new(None),
            ready: AtomicBool::new(false),
        });

        tokio::spawn(monitor(Arc::downgrade(&inner), backend));

        Ok(Self { inner })
    }

    async fn connection(&self) -> Result<Connection, StoreError> {
        if !self.is_ready() {
            return Err(self.unavailable());
        }
        self.inner
            .connection
            .read()
            .await
            .clone()
            .ok_or_else(|| self.unavailable())
    }

    fn unavailable(&self) -> StoreError {
        StoreError::Unavailable {
            target: self.inner.target.clone(),
        }
    }

    fn failed(&self, operation: &'static str, key: &str, err: RedisError) -> StoreError {
        self.inner.observe(&err);
        StoreError::operation(operation, key, &self.inner.target, err)
    }
}

/// Keeps the connection established and the readiness flag current.
///
/// Exits once every [`RedisStore`] handle has been dropped.
async fn monitor(inner: Weak<Inner>, backend: Backend) {
    let mut attempt: u32 = 0;

    loop {
        let Some(store) = inner.upgrade() else {
            break;
        };

        let delay = match store.ping(&backend).await {
            Ok(()) => {
                attempt = 0;
                store.mark_ready(true);
                store.config.health_check_interval()
            }
            Err(e) => {
                store.mark_ready(false);
                let delay = store.config.reconnect_delay(attempt);
                attempt = attempt.saturating_add(1);
                warn!(
                    cache.target = %store.target,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Cache store unreachable, attempting to reconnect in {}ms",
                    delay.as_millis()
                );
                delay
            }
        };

        drop(store);
        tokio::time::sleep(delay).await;
    }

    debug!("Cache store monitor stopped");
}

#[async_trait]
impl CacheStore for RedisStore {
    fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    fn target(&self) -> String {
        self.inner.target.clone()
    }

    #[instrument(skip(self), fields(cache.operation = "GET"))]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.connection().await?;

        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| self.failed("GET", key, e))
    }

    #[instrument(skip(self, value), fields(cache.operation = "SETEX"))]
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;

        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
            .await
            .map_err(|e| self.failed("SETEX", key, e))?;

        debug!(cache.key = %key, cache.ttl_secs = %ttl.as_secs(), "Cache set");

        Ok(())
    }

    #[instrument(skip(self), fields(cache.operation = "DEL"))]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;

        conn.del::<_, ()>(key)
            .await
            .map_err(|e| self.failed("DEL", key, e))
    }

    /// One `MULTI`/`EXEC` transaction on a single node. A transaction cannot
    /// span cluster slots, so cluster mode sends a plain pipeline.
    #[instrument(skip(self), fields(cache.operation = "MULTI_DEL"))]
    async fn delete_many(&self, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection().await?;

        let mut pipe = redis::pipe();
        if !self.inner.config.cluster {
            pipe.atomic();
        }
        for key in keys {
            pipe.del(key).ignore();
        }

        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| self.failed("MULTI_DEL", &keys.join(","), e))?;

        debug!(cache.keys = ?keys, "Cache keys deleted");

        Ok(())
    }

    /// `SCAN` + `DEL` over keys matching `<prefix>*`. A cluster `SCAN` only
    /// walks one node, so cluster mode reports the sweep as unsupported and
    /// variants are left to expire.
    #[instrument(skip(self), fields(cache.operation = "SCAN_DEL"))]
    async fn delete_prefixed(&self, prefix: &str) -> Result<u64, StoreError> {
        if self.inner.config.cluster {
            return Err(StoreError::Unsupported {
                operation: "SCAN_DEL",
                target: self.inner.target.clone(),
            });
        }

        let mut conn = self.connection().await?;
        let pattern = format!("{}*", escape_glob(prefix));
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| self.failed("SCAN", &pattern, e))?;

            if !keys.is_empty() {
                let count: u64 = conn
                    .del(&keys)
                    .await
                    .map_err(|e| self.failed("DEL", &keys.join(","), e))?;
                deleted += count;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(cache.pattern = %pattern, cache.deleted = %deleted, "Prefix invalidation complete");

        Ok(deleted)
    }
}

/// Escape the characters `MATCH` treats as glob syntax.
fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
