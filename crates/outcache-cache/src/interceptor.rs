//! Read-before-handle and write-after-handle halves of the cache.
//!
//! [`OutputCache::read`] runs before the handler and may answer the request
//! from the store. [`OutputCache::write`] runs once a response exists and
//! either stores it, invalidates keys touched by a mutation, or masks a
//! server error with the entry loaded by `read`.
//!
//! Both halves are best effort: any store failure is logged and the request
//! carries on as if it were uncached.

use axum::http::{HeaderValue, Method, StatusCode, header};
use outcache_config::CacheOptions;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::entry::{CacheEntry, Payload};
use crate::keys::{generate_cache_key, generate_del_keys, generate_del_prefixes};
use crate::metrics::{track_invalidation, track_lookup, track_stale_served, track_write};
use crate::request::{CacheRequest, CacheResponse};
use crate::store::{CacheStore, StoreError};

/// Per-route cache policy, supplied by whoever wires the route.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteCacheOptions {
    /// `GET` responses of this route are served from and stored in the cache.
    pub is_cacheable: bool,

    /// `PUT` and `DELETE` on this route evict the resource and its collection.
    pub clear_cache: bool,

    /// Collection path to evict instead of the configured parent rule.
    pub collection_path: Option<String>,
}

impl RouteCacheOptions {
    pub fn cacheable() -> Self {
        Self {
            is_cacheable: true,
            ..Self::default()
        }
    }

    pub fn clearing() -> Self {
        Self {
            clear_cache: true,
            ..Self::default()
        }
    }

    pub fn with_clear_cache(mut self) -> Self {
        self.clear_cache = true;
        self
    }

    pub fn with_collection_path(mut self, path: impl Into<String>) -> Self {
        self.collection_path = Some(path.into());
        self
    }

    /// Whether the write half has anything to do for this route.
    pub fn participates(&self) -> bool {
        self.is_cacheable || self.clear_cache
    }
}

/// Scratch state for one request, shared by its read and write halves.
#[derive(Debug, Default)]
pub struct RequestCacheContext {
    entry: Option<CacheEntry>,
}

impl RequestCacheContext {
    /// Context for a request whose cached entry was loaded elsewhere.
    pub fn with_entry(entry: CacheEntry) -> Self {
        Self { entry: Some(entry) }
    }

    pub fn entry(&self) -> Option<&CacheEntry> {
        self.entry.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.entry.is_some()
    }
}

/// What the host should do after the read half ran.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Dispatch to the handler.
    Continue,
    /// Answer with this response; the handler must not run.
    Respond(CacheResponse),
}

/// What the write half did with a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The route does not take part in caching, or the method never does.
    Skipped,
    /// Resource and collection keys were evicted, with their query and
    /// vary-header variants.
    Invalidated,
    /// Non-200 response left as it was.
    Unchanged,
    /// A server error was replaced by the previously cached response.
    ServedStale,
    /// The response came from the cache and is not stored again.
    AlreadyCached,
    Stored,
    /// The store was not ready, so nothing was stored or evicted.
    StoreUnavailable,
    /// A store call or key derivation failed; the response is untouched.
    Failed,
}

/// Shared handle to the cache: the store connection plus key options.
///
/// Built once at startup and cloned into every route that uses it.
#[derive(Clone)]
pub struct OutputCache {
    store: Arc<dyn CacheStore>,
    options: Arc<CacheOptions>,
}

impl fmt::Debug for OutputCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputCache")
            .field("store", &self.store)
            .field("options", &self.options)
            .finish()
    }
}

impl OutputCache {
    pub fn new(store: Arc<dyn CacheStore>, options: CacheOptions) -> Self {
        Self {
            store,
            options: Arc::new(options),
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Look the request up in the cache.
    ///
    /// On a hit the entry is attached to `ctx` and returned as a ready
    /// response. Store errors, misses and undecodable entries all continue
    /// to the handler.
    pub async fn read(
        &self,
        route: &RouteCacheOptions,
        request: &CacheRequest,
        ctx: &mut RequestCacheContext,
    ) -> ReadOutcome {
        if !route.is_cacheable || request.method != Method::GET {
            return ReadOutcome::Continue;
        }

        if !self.store.is_ready() {
            debug!(cache.target = %self.store.target(), "Cache store not ready, skipping lookup");
            track_lookup("unavailable");
            return ReadOutcome::Continue;
        }

        let key = match generate_cache_key(request, &self.options) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, path = %request.path, "Unable to derive cache key");
                return ReadOutcome::Continue;
            }
        };

        let bytes = match self.store.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(cache.key = %key, "Cache miss");
                track_lookup("miss");
                return ReadOutcome::Continue;
            }
            Err(e) => {
                error!(
                    cache.key = %key,
                    cache.target = %self.store.target(),
                    error = %e,
                    "Unable to perform GET"
                );
                track_lookup("error");
                return ReadOutcome::Continue;
            }
        };

        let entry = match CacheEntry::decode(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(cache.key = %key, error = %e, "Discarding malformed cache entry");
                track_lookup("malformed");
                return ReadOutcome::Continue;
            }
        };

        debug!(cache.key = %key, "Cache hit");
        track_lookup("hit");

        let response = CacheResponse::new(
            entry.status(),
            entry.header_map(),
            entry.payload.to_bytes(),
        );
        ctx.entry = Some(entry);
        ReadOutcome::Respond(response)
    }

    /// Act on the response produced for `request`.
    ///
    /// `response` is only rewritten for the stale fallback; every other path
    /// leaves it exactly as it was.
    pub async fn write(
        &self,
        route: &RouteCacheOptions,
        request: &CacheRequest,
        ctx: &RequestCacheContext,
        response: &mut CacheResponse,
    ) -> WriteOutcome {
        if !route.participates() || request.method == Method::POST {
            return WriteOutcome::Skipped;
        }

        if route.clear_cache && (request.method == Method::PUT || request.method == Method::DELETE)
        {
            return self.invalidate(route, request).await;
        }

        if response.status != StatusCode::OK {
            if response.status.is_server_error()
                && let Some(entry) = ctx.entry()
            {
                serve_stale(entry, response);
                return WriteOutcome::ServedStale;
            }
            return WriteOutcome::Unchanged;
        }

        if ctx.is_loaded() {
            return WriteOutcome::AlreadyCached;
        }

        self.store_response(request, response).await
    }

    async fn invalidate(&self, route: &RouteCacheOptions, request: &CacheRequest) -> WriteOutcome {
        let keys = match generate_del_keys(request, &self.options, route) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, path = %request.path, "Unable to derive invalidation keys");
                return WriteOutcome::Failed;
            }
        };

        if !self.store.is_ready() {
            debug!(cache.target = %self.store.target(), cache.keys = ?keys, "Cache store not ready, skipping invalidation");
            return WriteOutcome::StoreUnavailable;
        }

        if let Err(e) = self.store.delete_many(&keys).await {
            error!(
                cache.keys = ?keys,
                cache.target = %self.store.target(),
                error = %e,
                "Unable to perform DEL"
            );
            track_invalidation("failed");
            return WriteOutcome::Failed;
        }
        debug!(cache.keys = ?keys, "Cache invalidated");

        if !self.evict_variants(route, request).await {
            track_invalidation("failed");
            return WriteOutcome::Failed;
        }

        track_invalidation("ok");
        WriteOutcome::Invalidated
    }

    /// Sweep the query and vary-header variants the exact keys miss.
    async fn evict_variants(&self, route: &RouteCacheOptions, request: &CacheRequest) -> bool {
        for prefix in generate_del_prefixes(request, &self.options, route) {
            match self.store.delete_prefixed(&prefix).await {
                Ok(deleted) => {
                    debug!(cache.prefix = %prefix, cache.deleted = %deleted, "Cache variants invalidated");
                }
                Err(StoreError::Unsupported { .. }) => {
                    debug!(cache.target = %self.store.target(), "Prefix invalidation unsupported, variants expire by TTL");
                    return true;
                }
                Err(e) => {
                    error!(
                        cache.prefix = %prefix,
                        cache.target = %self.store.target(),
                        error = %e,
                        "Unable to invalidate cache variants"
                    );
                    return false;
                }
            }
        }
        true
    }

    async fn store_response(&self, request: &CacheRequest, response: &CacheResponse) -> WriteOutcome {
        if !self.store.is_ready() {
            debug!(cache.target = %self.store.target(), "Cache store not ready, skipping write");
            return WriteOutcome::StoreUnavailable;
        }

        let key = match generate_cache_key(request, &self.options) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, path = %request.path, "Unable to derive cache key");
                return WriteOutcome::Failed;
            }
        };

        let entry = CacheEntry::new(
            response.status,
            &response.headers,
            Payload::from_body(&response.body),
        );
        let bytes = match entry.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(cache.key = %key, error = %e, "Failed to serialize cache entry");
                track_write("failed");
                return WriteOutcome::Failed;
            }
        };

        match self.store.set(&key, &bytes, self.options.ttl()).await {
            Ok(()) => {
                debug!(cache.key = %key, cache.ttl_secs = %self.options.expires_in, "Cache set");
                track_write("stored");
                WriteOutcome::Stored
            }
            Err(e) => {
                error!(
                    cache.key = %key,
                    cache.target = %self.store.target(),
                    error = %e,
                    "Unable to perform SETEX"
                );
                track_write("failed");
                WriteOutcome::Failed
            }
        }
    }
}

/// Replace a failed response with the last known good one.
fn serve_stale(entry: &CacheEntry, response: &mut CacheResponse) {
    response.status = entry.status();
    response.headers.remove(header::CONTENT_LENGTH);
    response.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json; charset=utf-8"),
    );
    for (name, value) in entry.header_map().iter() {
        response.headers.insert(name.clone(), value.clone());
    }
    response.body = entry.payload.to_bytes();

    warn!(status = %response.status, "Serving stale cached response after server error");
    track_stale_served();
}
