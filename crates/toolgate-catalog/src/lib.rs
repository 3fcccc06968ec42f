//! Catalog side of the external-MCP bridge.
//!
//! Owns the persisted model (attachments and tool definitions), the tool
//! extraction pipeline that turns a registry attachment into concrete
//! `direct` or `proxy` definitions, the buffered deployment-event trail,
//! and the one-shot name backfill for the sanitizer change.

pub mod error;
pub mod events;
pub mod extract;
pub mod listing;
pub mod migrate;
pub mod queries;
pub mod types;

pub use error::{CatalogError, CatalogResult};
pub use events::EventBuffer;
pub use extract::{ToolExtractor, PROXY_DELIMITER};
pub use listing::{list_available_servers, AvailableServer, MAX_LISTING_RESULTS};
pub use migrate::{rename_tools, RenameReport};
pub use queries::{MemoryQueries, Queries};
pub use types::{
    AttachmentRef, DeploymentEvent, ExternalMcpAttachment, ExternalMcpToolDefinition,
    ExtractTask, ToolDefinitionKind, Toolset, PROXY_TOOL_NAME,
};
