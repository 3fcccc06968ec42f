//! Execution layer for proxied external MCP servers.
//!
//! Composes request headers from system environment variables, user
//! configuration, and OAuth tokens, then forwards `tools/list` and
//! `tools/call` traffic through fresh per-call MCP sessions.

pub mod env;
pub mod error;
pub mod executor;
pub mod headers;

pub use env::CiEnv;
pub use error::{ProxyError, ProxyResult};
pub use executor::{
    EnvLoader, Plan, PlanInputs, PlanResolver, ProxyEntry, ProxyExecutor, PROXY_DELIMITER,
};
pub use headers::{build_headers, to_http_header};
