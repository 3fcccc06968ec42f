//! Catalog error types.
//!
//! Extraction failures split into *permanent* errors (re-running the task
//! cannot help; recorded in the deployment event log) and transient ones
//! (the caller's retry policy applies).

use thiserror::Error;
use uuid::Uuid;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur in the catalog pipeline.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The attachment references a registry that does not exist.
    #[error("Registry not found: {0}")]
    RegistryNotFound(Uuid),

    /// The server speaks legacy OAuth 2.0, which needs manual client
    /// registration and is refused.
    #[error("Server {0} requires OAuth 2.0, which is not supported")]
    UnsupportedOAuth(String),

    /// An upstream tool name contains the reserved `--` delimiter.
    #[error("Tool name contains reserved delimiter '--': {0}")]
    ReservedDelimiter(String),

    /// The server could not be connected to for a non-auth reason.
    #[error("Connection to {server} failed: {message}")]
    ConnectFailed { server: String, message: String },

    /// Registry error.
    #[error(transparent)]
    Registry(#[from] toolgate_registry::RegistryError),

    /// MCP client error.
    #[error(transparent)]
    Mcp(#[from] toolgate_mcp::McpError),

    /// URN construction error.
    #[error(transparent)]
    Urn(#[from] toolgate_urn::UrnError),

    /// Persistence failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CatalogError {
    /// Whether re-running the task could possibly succeed.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::RegistryNotFound(_)
            | Self::UnsupportedOAuth(_)
            | Self::ReservedDelimiter(_)
            | Self::ConnectFailed { .. }
            | Self::Urn(_) => true,
            Self::Registry(e) => matches!(
                e,
                toolgate_registry::RegistryError::NotFound(_)
                    | toolgate_registry::RegistryError::Invalid(_)
                    | toolgate_registry::RegistryError::NoUsableRemote(_)
            ),
            Self::Mcp(_) | Self::Storage(_) => false,
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}
