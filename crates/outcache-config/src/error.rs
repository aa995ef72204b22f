use validator::ValidationErrors;

/// Errors raised while loading configuration at startup.
///
/// These are the only cache-layer errors that propagate upward: callers are
/// expected to abort initialization rather than run with a bad configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value `{value}`")]
    InvalidVar { var: &'static str, value: String },

    #[error("invalid cache configuration: {0}")]
    Validation(#[from] ValidationErrors),
}
