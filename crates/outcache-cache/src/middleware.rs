//! Axum adapter running the read and write halves around a route.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware, routing::get};
//! use outcache_cache::{OutputCache, RouteCacheOptions, output_cache};
//!
//! let app = Router::new().route(
//!     "/articles/{id}",
//!     get(get_article)
//!         .put(update_article)
//!         .route_layer(middleware::from_fn_with_state(
//!             cache.route(RouteCacheOptions::cacheable().with_clear_cache()),
//!             output_cache,
//!         )),
//! );
//! ```

use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, header, response::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use tracing::{debug, error};

use crate::interceptor::{OutputCache, ReadOutcome, RequestCacheContext, RouteCacheOptions};
use crate::request::{CacheRequest, CacheResponse};

/// Middleware state: the shared cache plus the policy of one route.
#[derive(Clone, Debug)]
pub struct RouteCache {
    pub cache: OutputCache,
    pub options: RouteCacheOptions,
}

impl OutputCache {
    /// Bind this cache to a route policy, for use with
    /// `middleware::from_fn_with_state`.
    pub fn route(&self, options: RouteCacheOptions) -> RouteCache {
        RouteCache {
            cache: self.clone(),
            options,
        }
    }
}

/// Serve from the cache when possible, otherwise run the handler and hand
/// its response to the write half.
pub async fn output_cache(State(route): State<RouteCache>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let cache_request = match CacheRequest::from_parts(&parts) {
        Ok(cache_request) => cache_request,
        Err(e) => {
            debug!(error = %e, "Bypassing cache for request with undecodable query");
            return next.run(Request::from_parts(parts, body)).await;
        }
    };
    let request = Request::from_parts(parts, body);

    let mut ctx = RequestCacheContext::default();
    let response = match route.cache.read(&route.options, &cache_request, &mut ctx).await {
        ReadOutcome::Respond(cached) => cached.into_response(),
        ReadOutcome::Continue => next.run(request).await,
    };

    if !route.options.participates() || cache_request.method == Method::POST {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!(error = %e, "Failed to buffer response body");
            return without_body(parts);
        }
    };

    let mut buffered = CacheResponse::new(parts.status, std::mem::take(&mut parts.headers), bytes);
    let outcome = route
        .cache
        .write(&route.options, &cache_request, &ctx, &mut buffered)
        .await;
    debug!(?outcome, path = %cache_request.path, "Cache write finished");

    parts.status = buffered.status;
    parts.headers = buffered.headers;
    Response::from_parts(parts, Body::from(buffered.body))
}

/// Keep status and headers but drop a body that could not be read.
fn without_body(mut parts: Parts) -> Response {
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::empty())
}
