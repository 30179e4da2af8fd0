//! Chat error types.
//!
//! Every failure the adapter can report surfaces through [`ChatError`].
//! Input problems are reported before any backend call is made; backend
//! failures that happen mid-stream terminate the prefix sequence.

/// Unified error type for the chat adapter.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    // -- Input errors --------------------------------------------------------
    /// The prompt, history or generation parameters were malformed.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The requested model name does not map to any known backend.
    #[error("unsupported model: {model}")]
    UnsupportedModel { model: String },

    // -- Backend errors ------------------------------------------------------
    /// The hosted endpoint could not be reached, rejected the request
    /// (authentication, rate limiting) or reported an error mid-stream.
    #[error("backend transport error{}: {reason}", status_suffix(.status))]
    BackendTransport {
        /// HTTP status returned by the endpoint, when one was received.
        status: Option<u16>,
        reason: String,
    },

    /// The endpoint sent a fragment that does not have the expected shape.
    #[error("backend protocol error: {reason}")]
    BackendProtocol { reason: String },

    // -- Configuration errors ------------------------------------------------
    /// Configuration loading or validation failed.
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChatError>;

impl ChatError {
    /// Shorthand for a transport error without an HTTP status.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::BackendTransport {
            status: None,
            reason: reason.into(),
        }
    }

    /// Shorthand for a protocol error.
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::BackendProtocol {
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors caused by the caller's input rather than the
    /// backend.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::UnsupportedModel { .. }
        )
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        Self::BackendTransport {
            status: err.status().map(|s| s.as_u16()),
            reason: err.to_string(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}
