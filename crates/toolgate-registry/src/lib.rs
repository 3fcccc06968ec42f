//! Client for remote MCP registries.
//!
//! A registry is a catalog of MCP servers behind the `v0.1/servers` HTTP
//! API. This crate lists servers, resolves one server's latest version to a
//! concrete remote (preferring streamable-HTTP over SSE), injects tenant
//! credentials through a pluggable [`Backend`], and caches responses for 24
//! hours keyed by operation, URL, and tenant identity.

pub mod backend;
pub mod cache;
pub mod client;
pub mod error;
pub mod types;

pub use backend::{Backend, PassthroughBackend, TenantBackend};
pub use cache::{cache_key, MemoryCache, MetadataCache, NoopCache, CACHE_TTL};
pub use client::RegistryClient;
pub use error::{RegistryError, RegistryResult};
pub use types::{
    HeaderDefinition, ListServersRequest, Registry, ServerDetails, ServerSummary, ToolSummary,
};
