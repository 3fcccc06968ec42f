//! MCP client error types.

use thiserror::Error;

/// Result type for MCP operations.
pub type McpResult<T> = Result<T, McpError>;

/// Errors that can occur during MCP operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// The upstream server rejected our credentials. Sticky: once raised,
    /// every operation on the same client returns it until close.
    #[error("Authentication rejected by {remote_url} (status {status_code})")]
    AuthRejected {
        remote_url: String,
        status_code: u16,
        www_authenticate: Option<String>,
    },

    /// Connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Tool execution failed.
    #[error("Tool execution failed: {0}")]
    ToolError(String),

    /// Server initialization failed.
    #[error("Server initialization failed: {0}")]
    InitializationFailed(String),

    /// The client has been closed.
    #[error("Client is closed")]
    Closed,

    /// Request timed out.
    #[error("Server timeout")]
    Timeout,

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl McpError {
    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create a protocol error.
    pub fn protocol_error(message: impl Into<String>) -> Self {
        Self::ProtocolError(message.into())
    }

    /// Create a tool error.
    pub fn tool_error(message: impl Into<String>) -> Self {
        Self::ToolError(message.into())
    }

    /// True for the sticky auth-rejection variant.
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, Self::AuthRejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_rejected_display() {
        let err = McpError::AuthRejected {
            remote_url: "https://mcp.example.com".to_string(),
            status_code: 401,
            www_authenticate: Some("Bearer realm=\"mcp\"".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Authentication rejected by https://mcp.example.com (status 401)"
        );
        assert!(err.is_auth_rejected());
    }

    #[test]
    fn test_other_errors_are_not_auth_rejected() {
        assert!(!McpError::Timeout.is_auth_rejected());
        assert!(!McpError::connection_failed("refused").is_auth_rejected());
    }
}
