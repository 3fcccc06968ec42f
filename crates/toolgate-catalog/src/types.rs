//! Catalog data model for external MCP servers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use toolgate_mcp::{OAuthDiscovery, ToolAnnotations, TransportType};
use toolgate_registry::HeaderDefinition;
use toolgate_urn::ToolUrn;
use uuid::Uuid;

/// Name of the synthetic definition representing a whole upstream server.
pub const PROXY_TOOL_NAME: &str = "proxy";

/// An external MCP server bound to a deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalMcpAttachment {
    pub id: Uuid,
    pub deployment_id: Uuid,
    pub registry_id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// URN-safe slug; the `<slug>--<tool>` prefix for proxied names.
    pub slug: String,
    /// Opaque id used to look the server up in the registry.
    pub specifier: String,
    #[serde(default)]
    pub deleted: bool,
}

/// Direct definitions materialize one upstream tool; proxy definitions
/// stand for the whole server, expanded lazily at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolDefinitionKind {
    Direct,
    Proxy,
}

/// A persisted tool definition for an attachment.
///
/// Identity is `(attachment_id, name)`; re-extraction replaces rather than
/// duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalMcpToolDefinition {
    pub id: Uuid,
    pub attachment_id: Uuid,
    pub kind: ToolDefinitionKind,
    pub urn: ToolUrn,
    /// Sanitized tool name, or [`PROXY_TOOL_NAME`] for proxy definitions.
    pub name: String,
    /// Pre-truncation identifier, kept for rename backfills.
    pub untruncated_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
    pub remote_url: String,
    pub transport: TransportType,
    pub requires_oauth: bool,
    #[serde(default)]
    pub oauth: OAuthDiscovery,
    #[serde(default)]
    pub header_defs: Vec<HeaderDefinition>,
}

/// A consumer-facing collection of tools, referenced by sanitized name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toolset {
    pub id: Uuid,
    pub name: String,
    /// Tool names this toolset includes; rewritten by rename backfills.
    pub tool_names: Vec<String>,
}

/// One line of the human-readable extraction trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentEvent {
    pub project_id: Uuid,
    pub deployment_id: Uuid,
    pub attachment_id: Uuid,
    pub message: String,
}

/// The attachment fields an extraction task needs.
#[derive(Debug, Clone)]
pub struct AttachmentRef {
    pub id: Uuid,
    pub registry_id: Uuid,
    pub name: String,
    pub slug: String,
    pub specifier: String,
}

/// One tool-extraction task.
#[derive(Debug, Clone)]
pub struct ExtractTask {
    pub org_slug: String,
    pub project_id: Uuid,
    pub deployment_id: Uuid,
    pub attachment: AttachmentRef,
}
