//! Proxy executor error types.

use thiserror::Error;

/// Result type for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors that can occur proxying tool calls.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The resolver could not produce plan inputs for a URN.
    #[error("Failed to resolve {urn}: {message}")]
    Resolve { urn: String, message: String },

    /// The environment loader failed.
    #[error("Failed to load environment: {0}")]
    EnvLoad(String),

    /// MCP client error, forwarded.
    #[error(transparent)]
    Mcp(#[from] toolgate_mcp::McpError),
}

impl ProxyError {
    pub fn resolve(urn: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Resolve {
            urn: urn.to_string(),
            message: message.into(),
        }
    }

    pub fn env_load(message: impl Into<String>) -> Self {
        Self::EnvLoad(message.into())
    }
}
