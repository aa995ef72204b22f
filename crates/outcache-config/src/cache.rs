//! Options consumed by the cache core.
//!
//! # Environment Variables
//!
//! - `CACHE_PARTITION`: namespace prefix for every key (default: `default`)
//! - `CACHE_VARY_BY_HEADERS`: comma separated request headers that take part
//!   in the key (default: none)
//! - `CACHE_EXPIRES_IN`: time-to-live of stored entries in seconds (default: `60`)
//! - `CACHE_PARENT_KEY`: how collection keys are derived on invalidation,
//!   `strip-last-segment` or `disabled` (default: `strip-last-segment`)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use validator::{Validate, ValidationError};

use crate::{ConfigError, Source, var_or};

pub const DEFAULT_PARTITION: &str = "default";
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 60;

/// How the parent collection path of a mutated resource is found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParentKeyRule {
    /// `/articles/42` invalidates `/articles` as well.
    #[default]
    StripLastSegment,
    /// Only the resource key itself is invalidated, unless a route supplies
    /// its own collection path.
    Disabled,
}

impl FromStr for ParentKeyRule {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strip-last-segment" => Ok(Self::StripLastSegment),
            "disabled" | "none" => Ok(Self::Disabled),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ParentKeyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StripLastSegment => f.write_str("strip-last-segment"),
            Self::Disabled => f.write_str("disabled"),
        }
    }
}

/// Key derivation and expiry options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CacheOptions {
    /// Logical namespace isolating keys of datasets that share one store.
    #[validate(
        length(min = 1, max = 128),
        custom(function = "validate_partition")
    )]
    pub partition: String,

    /// Request headers whose values take part in the key, in key order.
    #[validate(custom(function = "validate_header_names"))]
    pub vary_by_headers: Vec<String>,

    /// Time-to-live of stored entries in seconds.
    #[validate(range(min = 1))]
    pub expires_in: u64,

    pub parent_key: ParentKeyRule,
}

impl CacheOptions {
    /// Load options from environment variables without validating them.
    pub fn from_source(source: &Source<'_>) -> Result<Self, ConfigError> {
        let vary_by_headers = source("CACHE_VARY_BY_HEADERS")
            .map(|value| {
                value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            partition: source("CACHE_PARTITION").unwrap_or_else(|| DEFAULT_PARTITION.into()),
            vary_by_headers,
            expires_in: var_or(source, "CACHE_EXPIRES_IN", DEFAULT_EXPIRES_IN_SECS)?,
            parent_key: var_or(source, "CACHE_PARENT_KEY", ParentKeyRule::default())?,
        })
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    pub fn with_vary_by_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vary_by_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = seconds;
        self
    }

    pub fn with_parent_key(mut self, rule: ParentKeyRule) -> Self {
        self.parent_key = rule;
        self
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            partition: DEFAULT_PARTITION.into(),
            vary_by_headers: Vec::new(),
            expires_in: DEFAULT_EXPIRES_IN_SECS,
            parent_key: ParentKeyRule::default(),
        }
    }
}

// `|` separates key segments.
fn validate_partition(partition: &str) -> Result<(), ValidationError> {
    if partition.contains('|') {
        return Err(ValidationError::new("partition_separator")
            .with_message("partition must not contain '|'".into()));
    }
    Ok(())
}

fn validate_header_names(names: &[String]) -> Result<(), ValidationError> {
    for name in names {
        if http::HeaderName::from_bytes(name.as_bytes()).is_err() {
            return Err(ValidationError::new("header_name")
                .with_message(format!("`{name}` is not a valid header name").into()));
        }
    }
    Ok(())
}
