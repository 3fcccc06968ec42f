//! MCP protocol client for remote servers.
//!
//! Speaks JSON-RPC 2.0 over the two remote MCP transports
//! (streamable-HTTP and legacy SSE), with a sticky auth-rejection
//! interceptor and OAuth metadata discovery for servers that answer 401.
//!
//! A session is one [`McpClient`]: connect runs the
//! `initialize`/`notifications/initialized` handshake, then `tools/list`
//! and `tools/call` are available until close.

pub mod client;
pub mod error;
pub mod oauth;
pub mod protocol;
pub mod sse;
pub mod streamable;
pub mod transport;

pub use client::McpClient;
pub use error::{McpError, McpResult};
pub use oauth::{discover_oauth_metadata, OAuthDiscovery, OAuthVersion};
pub use protocol::{McpTool, ToolAnnotations, ToolCallResult};
pub use transport::{ClientOptions, Transport, TransportType};
