//! Cache key derivation.
//!
//! Keys are human readable strings rather than hashes:
//!
//! ```text
//! <partition>|<method>|<path>[?<name>=<value>&...]|<header>=<value>|...
//! ```
//!
//! The method and path are lower-cased, query parameters are ordered by raw
//! code point order of their names and every vary header present on the
//! request contributes one segment, in configured order, with its name
//! lower-cased and all whitespace removed from its value.
//!
//! Separator characters occurring inside a segment are percent-encoded
//! (`|` becomes `%7C`, and so on), so no request can forge the segments of
//! another. `%` itself is encoded in query and header segments.

use axum::http::{HeaderMap, Method};
use outcache_config::{CacheOptions, ParentKeyRule};

use crate::interceptor::RouteCacheOptions;
use crate::request::{CacheRequest, QueryParams};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("header `{name}` has a value that is not visible ASCII")]
    InvalidHeaderValue { name: String },
}

/// Key under which the response to `request` is stored.
///
/// # Errors
///
/// Returns [`KeyError::InvalidHeaderValue`] when a vary header carries a
/// value that cannot be read as text.
pub fn generate_cache_key(
    request: &CacheRequest,
    options: &CacheOptions,
) -> Result<String, KeyError> {
    build_key(
        options,
        &request.method,
        &request.path,
        &request.query,
        &request.headers,
    )
}

/// Keys to evict when `request` mutates the resource at its path.
///
/// The first key is the cached `GET` of the resource itself; when the request
/// carries a query string the query-less variant follows. The last key is
/// the cached `GET` of the parent collection, found through the route's
/// `collection_path` or else the configured [`ParentKeyRule`].
///
/// # Errors
///
/// Same as [`generate_cache_key`].
pub fn generate_del_keys(
    request: &CacheRequest,
    options: &CacheOptions,
    route: &RouteCacheOptions,
) -> Result<Vec<String>, KeyError> {
    let no_query = QueryParams::new();
    let mut keys = vec![build_key(
        options,
        &Method::GET,
        &request.path,
        &request.query,
        &request.headers,
    )?];

    if !request.query.is_empty() {
        keys.push(build_key(
            options,
            &Method::GET,
            &request.path,
            &no_query,
            &request.headers,
        )?);
    }

    if let Some(collection) = collection_path(request, options, route) {
        let key = build_key(
            options,
            &Method::GET,
            collection,
            &no_query,
            &request.headers,
        )?;
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    Ok(keys)
}

/// Key prefixes covering every other cached variant of the mutated resource
/// and of its collection: any query string, any vary header values.
///
/// For `/articles/42` under partition `p` these are `p|get|/articles/42?`,
/// `p|get|/articles/42|`, `p|get|/articles?` and `p|get|/articles|`.
pub fn generate_del_prefixes(
    request: &CacheRequest,
    options: &CacheOptions,
    route: &RouteCacheOptions,
) -> Vec<String> {
    let mut prefixes = Vec::with_capacity(4);
    let paths = std::iter::once(request.path.as_str())
        .chain(collection_path(request, options, route));

    for path in paths {
        let base = base_key(options, &Method::GET, path);
        for separator in ['?', '|'] {
            let prefix = format!("{base}{separator}");
            if !prefixes.contains(&prefix) {
                prefixes.push(prefix);
            }
        }
    }
    prefixes
}

fn collection_path<'a>(
    request: &'a CacheRequest,
    options: &CacheOptions,
    route: &'a RouteCacheOptions,
) -> Option<&'a str> {
    match &route.collection_path {
        Some(path) => Some(path.as_str()),
        None => match options.parent_key {
            ParentKeyRule::StripLastSegment => parent_path(&request.path),
            ParentKeyRule::Disabled => None,
        },
    }
}

/// Path of the collection containing `path`, ignoring a trailing slash.
///
/// `/articles/42` yields `/articles`, `/articles` yields `/` and the root has
/// no parent.
pub fn parent_path(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) => Some("/"),
        Some(index) => Some(&trimmed[..index]),
        None => None,
    }
}

fn build_key(
    options: &CacheOptions,
    method: &Method,
    path: &str,
    query: &QueryParams,
    headers: &HeaderMap,
) -> Result<String, KeyError> {
    let mut key = base_key(options, method, path);

    if !query.is_empty() {
        key.push('?');
        for (name, values) in query {
            push_escaped(&mut key, name, SEGMENT_RESERVED);
            key.push('=');
            for (index, value) in values.iter().enumerate() {
                if index > 0 {
                    key.push(',');
                }
                push_escaped(&mut key, value, QUERY_VALUE_RESERVED);
            }
            key.push('&');
        }
    }

    for name in &options.vary_by_headers {
        if let Some(value) = header_value(headers, name)? {
            key.push('|');
            key.push_str(&name.to_ascii_lowercase());
            key.push('=');
            push_escaped(&mut key, &value, SEGMENT_RESERVED);
        }
    }

    Ok(key)
}

/// Characters that delimit key segments. `%` is always encoded alongside.
const SEGMENT_RESERVED: &[char] = &['|', '&', '=', '?'];
/// Query values also reserve the comma joining repeated values.
const QUERY_VALUE_RESERVED: &[char] = &['|', '&', '=', '?', ','];

/// `partition|method|path`, the part shared by every variant of an endpoint.
fn base_key(options: &CacheOptions, method: &Method, path: &str) -> String {
    let mut key = format!(
        "{}|{}|",
        options.partition,
        method.as_str().to_ascii_lowercase()
    );
    for c in path.to_lowercase().chars() {
        match c {
            '|' | '?' => push_encoded(&mut key, c),
            _ => key.push(c),
        }
    }
    key
}

fn push_escaped(key: &mut String, segment: &str, reserved: &[char]) {
    for c in segment.chars() {
        if c == '%' || reserved.contains(&c) {
            push_encoded(key, c);
        } else {
            key.push(c);
        }
    }
}

/// Only ever called with ASCII separators.
fn push_encoded(key: &mut String, c: char) {
    key.push_str(&format!("%{:02X}", c as u32));
}

/// Value of header `name` with whitespace stripped, joining repeated headers
/// with commas. `None` when the request does not carry the header.
fn header_value(headers: &HeaderMap, name: &str) -> Result<Option<String>, KeyError> {
    let mut values = headers.get_all(name).iter().peekable();
    if values.peek().is_none() {
        return Ok(None);
    }

    let mut joined = String::new();
    for (index, value) in values.enumerate() {
        let text = value.to_str().map_err(|_| KeyError::InvalidHeaderValue {
            name: name.to_ascii_lowercase(),
        })?;
        if index > 0 {
            joined.push(',');
        }
        joined.extend(text.chars().filter(|c| !c.is_whitespace()));
    }
    Ok(Some(joined))
}
