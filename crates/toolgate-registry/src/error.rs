//! Registry client error types.

use thiserror::Error;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur talking to an MCP registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry rejected our credentials (401).
    #[error("Registry rejected credentials: {0}")]
    Unauthorized(String),

    /// The registry refused the request (403).
    #[error("Registry refused request: {0}")]
    Forbidden(String),

    /// The registry reported a client error (other 4xx).
    #[error("Registry returned {status}: {message}")]
    BadRequest { status: u16, message: String },

    /// The requested server does not exist.
    #[error("Server not found: {0}")]
    NotFound(String),

    /// The registry reported a conflicting state (409).
    #[error("Registry conflict: {0}")]
    Conflict(String),

    /// The registry payload did not match the expected shape.
    #[error("Invalid registry payload: {0}")]
    Invalid(String),

    /// The server advertises no usable remote.
    #[error("Server {0} has no streamable-http or sse remote")]
    NoUsableRemote(String),

    /// Upstream failure after retries were exhausted.
    #[error("Registry gateway error for {host}: {message}")]
    Gateway { host: String, message: String },

    /// Anything else.
    #[error("Unexpected registry error: {0}")]
    Unexpected(String),
}

impl RegistryError {
    /// Stable string code for the error class, used at API boundaries.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::BadRequest { .. } => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Invalid(_) | Self::NoUsableRemote(_) => "invalid",
            Self::Gateway { .. } => "gateway_error",
            Self::Unexpected(_) => "unexpected",
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
