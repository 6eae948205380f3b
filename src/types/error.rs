//! Error types for Causeway
//!
//! One error enum for the whole client. Absent objects are NOT errors: loaders
//! resolve them as `Ok(None)` so callers can tell "not found" apart from
//! transport or decode failures at the type level.
//!
//! Every variant is `Clone`: a failed load is shared by all concurrent waiters
//! of the same cache slot.

/// Main error type for client operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// Non-2xx response from a host; carries status and response body
    #[error("transport error: status {status}: {body}")]
    Transport { status: u16, body: String },

    /// Network-level failure (connect, timeout, broken body)
    #[error("network error: {0}")]
    Network(String),

    /// Claim mint failed or token rejected
    #[error("auth error: {0}")]
    Auth(String),

    /// Payload present but not parseable as the expected shape
    #[error("decode error: {0}")]
    Decode(String),

    /// Application-level precondition violated
    #[error("domain error: {0}")]
    Domain(String),

    /// Signing failure (bad key material)
    #[error("signing error: {0}")]
    Signing(String),

    /// Invalid client configuration
    #[error("config error: {0}")]
    Config(String),
}

impl ApiError {
    /// Whether this error is a non-2xx response with the given status
    pub fn is_status(&self, code: u16) -> bool {
        matches!(self, Self::Transport { status, .. } if *status == code)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Auth(format!("JWT error: {}", err))
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ApiError>;
