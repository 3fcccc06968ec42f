//! Test doubles for the external-MCP bridge.
//!
//! [`mock_mcp::MockMcpServer`] is an in-process MCP server that speaks both
//! remote transports (streamable-HTTP on `/mcp`, legacy SSE on `/sse`), so
//! client and proxy tests can run real handshakes against a real socket.
//! [`registry`] builds the JSON payloads the registry HTTP API returns.

pub mod mock_mcp;
pub mod registry;

pub use mock_mcp::{MockMcpServer, MockServerOptions, MockTool};
