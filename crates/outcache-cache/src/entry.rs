//! The unit stored per cache key.

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Headers that describe the connection or the encoding of one particular
/// message and must not be replayed from the cache.
static SKIPPED_HEADERS: [HeaderName; 6] = [
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::TE,
    header::TRAILER,
];

#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    #[error("malformed cache entry: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Response body as stored in the cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
    Json(serde_json::Value),
}

impl Payload {
    /// Text when the bytes are valid UTF-8, binary otherwise.
    pub fn from_body(body: &[u8]) -> Self {
        match std::str::from_utf8(body) {
            Ok(text) => Self::Text(text.to_owned()),
            Err(_) => Self::Binary(body.to_vec()),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            Self::Text(text) => Bytes::from(text.clone()),
            Self::Binary(bytes) => Bytes::from(bytes.clone()),
            Self::Json(value) => Bytes::from(value.to_string()),
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// A stored response. Only ever written for a `200 OK`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub payload: Payload,
}

impl CacheEntry {
    pub fn new(status: StatusCode, headers: &HeaderMap, payload: Payload) -> Self {
        Self {
            status_code: status.as_u16(),
            headers: capture_headers(headers),
            payload,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK)
    }

    /// Header map view of the stored headers. Entries that are no longer
    /// valid header names or values are dropped.
    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) else {
                debug!(header = %name, "Dropping unreplayable cached header");
                continue;
            };
            map.insert(name, value);
        }
        map
    }

    pub fn encode(&self) -> Result<Vec<u8>, EntryError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EntryError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn capture_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut captured = BTreeMap::new();
    for name in headers.keys() {
        if SKIPPED_HEADERS.contains(name) {
            continue;
        }
        let values: Result<Vec<&str>, _> =
            headers.get_all(name).iter().map(|v| v.to_str()).collect();
        match values {
            Ok(values) => {
                captured.insert(name.as_str().to_owned(), values.join(", "));
            }
            Err(_) => debug!(header = %name, "Skipping non UTF-8 response header"),
        }
    }
    captured
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.append("x-tag", HeaderValue::from_static("a"));
        headers.append("x-tag", HeaderValue::from_static("b"));
        headers
    }

    #[test]
    fn test_entry_round_trip() {
        let entry = CacheEntry::new(
            StatusCode::OK,
            &sample_headers(),
            Payload::from_body(br#"{"id":1}"#),
        );

        let decoded = CacheEntry::decode(&entry.encode().unwrap()).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(decoded.payload.to_bytes(), Bytes::from_static(br#"{"id":1}"#));
    }

    #[test]
    fn test_capture_skips_framing_headers() {
        let entry = CacheEntry::new(StatusCode::OK, &sample_headers(), Payload::from("x"));
        assert!(!entry.headers.contains_key("content-length"));
        assert_eq!(entry.headers["content-type"], "application/json");
        assert_eq!(entry.headers["x-tag"], "a, b");
    }

    #[test]
    fn test_binary_payload_is_kept_verbatim() {
        let body = [0xff, 0x00, 0xfe];
        let payload = Payload::from_body(&body);
        assert!(matches!(payload, Payload::Binary(_)));
        assert_eq!(payload.to_bytes().as_ref(), &body);
    }

    #[test]
    fn test_json_payload_serializes_value() {
        let payload = Payload::from(json!({ "ok": true }));
        assert_eq!(payload.to_bytes(), Bytes::from_static(br#"{"ok":true}"#));
    }

    #[test]
    fn test_malformed_entry() {
        assert!(matches!(
            CacheEntry::decode(b"not json"),
            Err(EntryError::Malformed(_))
        ));
        assert!(CacheEntry::decode(br#"{"status_code":200}"#).is_err());
    }

    #[test]
    fn test_header_map_rebuild() {
        let entry = CacheEntry::new(StatusCode::OK, &sample_headers(), Payload::from("x"));
        let map = entry.header_map();
        assert_eq!(map.get(header::CONTENT_TYPE).unwrap(), "application/json");
    }
}
