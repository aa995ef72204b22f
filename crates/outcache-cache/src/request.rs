//! Framework-neutral views of the request and response being cached.

use axum::body::{Body, Bytes};
use axum::extract::{OriginalUri, Query};
use axum::extract::rejection::QueryRejection;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::collections::BTreeMap;

/// Query parameters keyed by name. Keys iterate in code point order and a
/// repeated parameter keeps every value in arrival order.
pub type QueryParams = BTreeMap<String, Vec<String>>;

/// The parts of a request that determine its cache key.
#[derive(Clone, Debug)]
pub struct CacheRequest {
    pub method: Method,
    pub path: String,
    pub query: QueryParams,
    pub headers: HeaderMap,
}

impl CacheRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: QueryParams::new(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Capture the cache-relevant shape of an incoming request.
    ///
    /// Inside a nested router the URI has its prefix stripped, so the full
    /// path is taken from [`OriginalUri`] when axum recorded one.
    ///
    /// # Errors
    ///
    /// Fails when the query string cannot be decoded.
    pub fn from_parts(parts: &Parts) -> Result<Self, QueryRejection> {
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map_or(&parts.uri, |original| &original.0);
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)?;

        let mut query = QueryParams::new();
        for (name, value) in pairs {
            query.entry(name).or_default().push(value);
        }

        Ok(Self {
            method: parts.method.clone(),
            path: uri.path().to_owned(),
            query,
            headers: parts.headers.clone(),
        })
    }
}

/// A fully buffered response that the interceptors may inspect or rewrite.
#[derive(Clone, Debug)]
pub struct CacheResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CacheResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }
}

impl IntoResponse for CacheResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
