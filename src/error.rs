//! Switchyard error types

use std::time::Duration;

/// Switchyard error types
#[derive(Debug, thiserror::Error)]
pub enum SwitchyardError {
    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    /// No provider is registered under the requested identifier, or the
    /// vendor does not know the model.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    // Streaming errors
    #[error("stream error: {0}")]
    Stream(String),

    /// The request was cancelled, or the delta receiver went away.
    #[error("request cancelled")]
    Cancelled,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("operation not implemented: {0}")]
    NotImplemented(&'static str),

    // Tool calling errors
    #[error("tool '{name}' failed: {message}")]
    Tool { name: String, message: String },

    #[error("malformed arguments for tool '{name}': {message}")]
    InvalidToolArguments { name: String, message: String },

    /// The orchestrator hit its round cap while the model kept requesting tools.
    #[error("too many tool-calling rounds (limit {limit})")]
    TooManyRounds { limit: usize },

    // Soft errors
    #[error("empty response from model")]
    EmptyResponse,

    #[error("content filtered: {reason}")]
    ContentFiltered { reason: String },
}

impl SwitchyardError {
    /// Whether a retry has a reasonable chance of succeeding.
    ///
    /// Transport failures, rate limits, server-side 5xx responses and
    /// interrupted streams are transient. Everything else, including
    /// cancellation and orchestration errors, is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            SwitchyardError::Http(_)
            | SwitchyardError::RateLimited { .. }
            | SwitchyardError::Stream(_) => true,
            SwitchyardError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Vendor-provided back-off hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SwitchyardError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SwitchyardError {
    fn from(err: reqwest::Error) -> Self {
        SwitchyardError::Http(err.to_string())
    }
}

/// Result type alias for Switchyard operations
pub type Result<T> = std::result::Result<T, SwitchyardError>;
