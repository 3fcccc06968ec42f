//! MCP transport abstraction and the shared auth-rejection interceptor.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{McpError, McpResult};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// The two remote MCP transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportType {
    #[serde(rename = "streamable-http")]
    StreamableHttp,
    #[serde(rename = "sse")]
    Sse,
}

impl TransportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreamableHttp => "streamable-http",
            Self::Sse => "sse",
        }
    }
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransportType {
    type Err = McpError;

    fn from_str(s: &str) -> McpResult<Self> {
        match s {
            "streamable-http" => Ok(Self::StreamableHttp),
            "sse" => Ok(Self::Sse),
            other => Err(McpError::protocol_error(format!(
                "unknown transport type: {other:?}"
            ))),
        }
    }
}

/// Per-client connection options.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Sent verbatim as the `Authorization` header when set.
    pub authorization: Option<String>,
    /// Additional headers applied to every request.
    pub headers: HashMap<String, String>,
}

/// Transport trait for MCP communication.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send a request and wait for the matching response.
    async fn request(&self, request: JsonRpcRequest) -> McpResult<JsonRpcResponse>;

    /// Send a notification (no response expected).
    async fn notify(&self, notification: JsonRpcNotification) -> McpResult<()>;

    /// Close the transport.
    async fn close(&self) -> McpResult<()>;
}

#[derive(Debug, Clone)]
struct Rejection {
    status_code: u16,
    www_authenticate: Option<String>,
}

/// Sticky auth-rejection state shared by every request a client makes.
///
/// The first 401 or 403 from the upstream marks the whole client as
/// rejected (recording `WWW-Authenticate` on 401); every operation from
/// then on returns the same typed [`McpError::AuthRejected`] without
/// touching the network again.
#[derive(Debug)]
pub struct AuthState {
    remote_url: String,
    rejection: Mutex<Option<Rejection>>,
}

impl AuthState {
    pub fn new(remote_url: impl Into<String>) -> Self {
        Self {
            remote_url: remote_url.into(),
            rejection: Mutex::new(None),
        }
    }

    /// Return the sticky error if the upstream has already rejected us.
    pub fn check(&self) -> McpResult<()> {
        let guard = self.rejection.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(r) => Err(self.rejected_error(r)),
            None => Ok(()),
        }
    }

    /// Inspect a response status; on 401/403 record the rejection and
    /// return the typed error.
    pub fn intercept(&self, status: StatusCode, www_authenticate: Option<&str>) -> McpResult<()> {
        if status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN {
            return Ok(());
        }

        let rejection = Rejection {
            status_code: status.as_u16(),
            www_authenticate: if status == StatusCode::UNAUTHORIZED {
                www_authenticate.map(str::to_string)
            } else {
                None
            },
        };

        let mut guard = self.rejection.lock().unwrap_or_else(|e| e.into_inner());
        let stored = guard.get_or_insert(rejection);
        Err(self.rejected_error(stored))
    }

    fn rejected_error(&self, r: &Rejection) -> McpError {
        McpError::AuthRejected {
            remote_url: self.remote_url.clone(),
            status_code: r.status_code,
            www_authenticate: r.www_authenticate.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_type_serde() {
        assert_eq!(
            serde_json::to_string(&TransportType::StreamableHttp).unwrap(),
            "\"streamable-http\""
        );
        assert_eq!(
            serde_json::from_str::<TransportType>("\"sse\"").unwrap(),
            TransportType::Sse
        );
        assert_eq!("streamable-http".parse::<TransportType>().unwrap(), TransportType::StreamableHttp);
        assert!("stdio".parse::<TransportType>().is_err());
    }

    #[test]
    fn test_auth_state_clean() {
        let state = AuthState::new("https://mcp.example.com");
        assert!(state.check().is_ok());
        assert!(state.intercept(StatusCode::OK, None).is_ok());
        assert!(state.check().is_ok());
    }

    #[test]
    fn test_auth_state_401_records_www_authenticate() {
        let state = AuthState::new("https://mcp.example.com");
        let err = state
            .intercept(StatusCode::UNAUTHORIZED, Some("Bearer realm=\"mcp\""))
            .unwrap_err();
        match err {
            McpError::AuthRejected { remote_url, status_code, www_authenticate } => {
                assert_eq!(remote_url, "https://mcp.example.com");
                assert_eq!(status_code, 401);
                assert_eq!(www_authenticate.as_deref(), Some("Bearer realm=\"mcp\""));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_auth_state_is_sticky() {
        let state = AuthState::new("https://mcp.example.com");
        let _ = state.intercept(StatusCode::FORBIDDEN, None);

        // A later success does not clear the flag.
        assert!(state.check().is_err());
        match state.check().unwrap_err() {
            McpError::AuthRejected { status_code, www_authenticate, .. } => {
                assert_eq!(status_code, 403);
                assert_eq!(www_authenticate, None);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_auth_state_first_rejection_wins() {
        let state = AuthState::new("https://mcp.example.com");
        let _ = state.intercept(StatusCode::UNAUTHORIZED, Some("Bearer"));
        let _ = state.intercept(StatusCode::FORBIDDEN, None);
        match state.check().unwrap_err() {
            McpError::AuthRejected { status_code, .. } => assert_eq!(status_code, 401),
            other => panic!("unexpected error: {other}"),
        }
    }
}
