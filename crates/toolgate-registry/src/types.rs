//! Registry API types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use toolgate_mcp::TransportType;
use uuid::Uuid;

use crate::error::{RegistryError, RegistryResult};

/// A configured registry endpoint: identity plus base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub id: Uuid,
    pub name: String,
    /// Base URL, e.g. `https://registry.modelcontextprotocol.io`.
    pub url: String,
}

/// Filter for a server listing.
#[derive(Debug, Clone, Default)]
pub struct ListServersRequest {
    pub search: Option<String>,
    pub cursor: Option<String>,
}

/// One server from a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub version: String,
    pub title: Option<String>,
    pub website_url: Option<String>,
    pub icon_url: Option<String>,
}

/// A `(env_name, header_name)` pair declared by a server. `env_name`
/// lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderDefinition {
    pub env_name: String,
    pub header_name: String,
}

/// A tool advertised in the registry listing for a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

/// Resolved details for one server version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDetails {
    pub name: String,
    pub version: String,
    pub description: String,
    /// The remote chosen by the transport preference rule.
    pub remote_url: String,
    pub transport_type: TransportType,
    /// Pre-materialized tool list; empty when the registry does not carry
    /// one (the server is then proxied lazily).
    #[serde(default)]
    pub tools: Vec<ToolSummary>,
    /// Headers the server expects, as env-name/header-name pairs.
    #[serde(default)]
    pub headers: Vec<HeaderDefinition>,
}

// Wire shapes for the v0.1 registry API.

#[derive(Debug, Deserialize)]
pub(crate) struct ListServersResponse {
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
    #[serde(default)]
    pub metadata: ListMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListMetadata {
    #[serde(default)]
    pub count: u64,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerEntry {
    pub server: ServerBody,
    #[serde(rename = "_meta")]
    pub meta: ServerMeta,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerMeta {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerBody {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    pub title: Option<String>,
    pub website_url: Option<String>,
    #[serde(default)]
    pub icons: Vec<Icon>,
    #[serde(default)]
    pub remotes: Vec<Remote>,
    #[serde(default)]
    pub tools: Vec<WireTool>,
    #[serde(default)]
    pub headers: Vec<WireHeader>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Icon {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Remote {
    pub url: String,
    #[serde(rename = "type")]
    pub transport: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireHeader {
    pub env_name: String,
    pub header_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DetailsResponse {
    pub server: ServerBody,
}

impl ServerEntry {
    pub(crate) fn into_summary(self) -> ServerSummary {
        ServerSummary {
            id: self.meta.id,
            name: self.server.name,
            description: self.server.description,
            version: self.server.version,
            title: self.server.title,
            website_url: self.server.website_url,
            icon_url: self.server.icons.into_iter().next().map(|i| i.url),
        }
    }
}

impl ServerBody {
    /// Pick the preferred remote: `streamable-http` beats `sse`; anything
    /// else is unusable.
    pub(crate) fn into_details(self) -> RegistryResult<ServerDetails> {
        let chosen = self
            .remotes
            .iter()
            .find_map(|r| (r.transport == "streamable-http").then_some((r, TransportType::StreamableHttp)))
            .or_else(|| {
                self.remotes
                    .iter()
                    .find_map(|r| (r.transport == "sse").then_some((r, TransportType::Sse)))
            });

        let (remote, transport_type) = match chosen {
            Some(found) => found,
            None => return Err(RegistryError::NoUsableRemote(self.name)),
        };

        Ok(ServerDetails {
            remote_url: remote.url.clone(),
            transport_type,
            name: self.name,
            version: self.version,
            description: self.description,
            tools: self
                .tools
                .into_iter()
                .map(|t| ToolSummary {
                    name: t.name,
                    description: t.description,
                    input_schema: t.input_schema,
                })
                .collect(),
            headers: self
                .headers
                .into_iter()
                .map(|h| HeaderDefinition {
                    env_name: h.env_name,
                    header_name: h.header_name,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(remotes: Value) -> ServerBody {
        serde_json::from_value(json!({
            "name": "acme",
            "description": "Acme MCP",
            "version": "1.2.0",
            "remotes": remotes
        }))
        .unwrap()
    }

    #[test]
    fn test_transport_preference_streamable_wins() {
        let details = body(json!([
            {"url": "https://acme.example.com/sse", "type": "sse"},
            {"url": "https://acme.example.com/mcp", "type": "streamable-http"}
        ]))
        .into_details()
        .unwrap();
        assert_eq!(details.transport_type, TransportType::StreamableHttp);
        assert_eq!(details.remote_url, "https://acme.example.com/mcp");
    }

    #[test]
    fn test_transport_preference_sse_fallback() {
        let details = body(json!([
            {"url": "https://acme.example.com/sse", "type": "sse"}
        ]))
        .into_details()
        .unwrap();
        assert_eq!(details.transport_type, TransportType::Sse);
    }

    #[test]
    fn test_no_usable_remote_names_server() {
        let err = body(json!([{"url": "stdio://x", "type": "stdio"}]))
            .into_details()
            .unwrap_err();
        assert!(err.to_string().contains("acme"));
        assert_eq!(err.code(), "invalid");
    }

    #[test]
    fn test_server_details_json_round_trip() {
        let details = body(json!([
            {"url": "https://acme.example.com/mcp", "type": "streamable-http"}
        ]))
        .into_details()
        .unwrap();
        let encoded = serde_json::to_string(&details).unwrap();
        let back: ServerDetails = serde_json::from_str(&encoded).unwrap();
        assert_eq!(back.remote_url, details.remote_url);
        assert_eq!(back.transport_type, details.transport_type);
    }
}
