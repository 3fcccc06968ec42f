//! Tool extraction pipeline.
//!
//! For each attachment the extractor resolves the server in its registry,
//! probes the remote unauthenticated to find out whether it needs OAuth,
//! and materializes tool definitions: one `direct` definition per
//! registry-advertised tool, or a single `proxy` definition when the
//! registry carries no tool list.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use toolgate_mcp::{
    discover_oauth_metadata, ClientOptions, McpClient, McpError, OAuthDiscovery, OAuthVersion,
};
use toolgate_registry::{RegistryClient, ServerDetails};
use toolgate_urn::{sanitize, ToolKind, ToolUrn};

use crate::error::{CatalogError, CatalogResult};
use crate::events::EventBuffer;
use crate::queries::Queries;
use crate::types::{
    ExternalMcpToolDefinition, ExtractTask, ToolDefinitionKind, PROXY_TOOL_NAME,
};

pub use toolgate_urn::PROXY_DELIMITER;

/// Runs extraction tasks against a registry client and a store.
pub struct ToolExtractor {
    registry_client: Arc<RegistryClient>,
    queries: Arc<dyn Queries>,
}

impl ToolExtractor {
    pub fn new(registry_client: Arc<RegistryClient>, queries: Arc<dyn Queries>) -> Self {
        Self {
            registry_client,
            queries,
        }
    }

    /// Process one task, flushing the event trail even on failure.
    ///
    /// Errors with [`CatalogError::is_permanent`] true will not succeed on
    /// retry; the trail records why the tools did not materialize.
    pub async fn process(
        &self,
        task: &ExtractTask,
    ) -> CatalogResult<Vec<ExternalMcpToolDefinition>> {
        let events = EventBuffer::new(task.project_id, task.deployment_id, task.attachment.id);

        let result = self.run(task, &events).await;
        if let Err(ref e) = result {
            events.log(format!("extraction failed: {e}"));
        }
        if let Err(e) = events.flush(self.queries.as_ref()).await {
            warn!(
                attachment = %task.attachment.id,
                error = %e,
                "Failed to flush deployment events"
            );
        }

        result
    }

    async fn run(
        &self,
        task: &ExtractTask,
        events: &EventBuffer,
    ) -> CatalogResult<Vec<ExternalMcpToolDefinition>> {
        let attachment = &task.attachment;

        let registry = self
            .queries
            .get_registry(attachment.registry_id)
            .await?
            .ok_or(CatalogError::RegistryNotFound(attachment.registry_id))?;

        events.log(format!(
            "resolving {} ({}) in registry {}",
            attachment.name, attachment.specifier, registry.name
        ));

        let details = self
            .registry_client
            .get_server_details(&registry, &attachment.specifier)
            .await?;

        events.log(format!(
            "server {} resolved to {} over {}",
            details.name, details.remote_url, details.transport_type
        ));

        let (requires_oauth, oauth) = self.probe_auth(&details, events).await?;

        let definitions = materialize(attachment.id, &attachment.slug, &details, requires_oauth, oauth)?;
        for definition in &definitions {
            self.queries
                .upsert_tool_definition(definition.clone())
                .await?;
        }

        events.log(format!(
            "materialized {} tool definition(s) for {}",
            definitions.len(),
            details.name
        ));
        info!(
            org = %task.org_slug,
            attachment = %attachment.id,
            server = %details.name,
            tool_count = definitions.len(),
            "Extracted external MCP tools"
        );

        Ok(definitions)
    }

    /// Try an unauthenticated connect to classify the server's auth needs.
    async fn probe_auth(
        &self,
        details: &ServerDetails,
        events: &EventBuffer,
    ) -> CatalogResult<(bool, OAuthDiscovery)> {
        let connect = McpClient::connect(
            details.remote_url.clone(),
            details.transport_type,
            ClientOptions::default(),
        )
        .await;

        match connect {
            Ok(client) => {
                let _ = client.close().await;
                events.log("connected without authentication");
                Ok((false, OAuthDiscovery::default()))
            }
            Err(McpError::AuthRejected {
                www_authenticate, ..
            }) => {
                events.log("server rejected unauthenticated access, discovering OAuth metadata");
                let discovery =
                    discover_oauth_metadata(www_authenticate.as_deref(), &details.remote_url)
                        .await;

                if discovery.version == OAuthVersion::V2_0 {
                    // Legacy OAuth needs a manually registered client; the
                    // attachment cannot materialize.
                    return Err(CatalogError::UnsupportedOAuth(details.name.clone()));
                }

                events.log(format!("OAuth discovery: version {}", discovery.version));
                Ok((true, discovery))
            }
            Err(e) => Err(CatalogError::ConnectFailed {
                server: details.name.clone(),
                message: e.to_string(),
            }),
        }
    }
}

/// Build the definitions for one attachment from resolved server details.
fn materialize(
    attachment_id: Uuid,
    slug: &str,
    details: &ServerDetails,
    requires_oauth: bool,
    oauth: OAuthDiscovery,
) -> CatalogResult<Vec<ExternalMcpToolDefinition>> {
    if details.tools.is_empty() {
        let urn = ToolUrn::new(ToolKind::ExternalMcp, slug, PROXY_TOOL_NAME);
        urn.validate()?;
        return Ok(vec![ExternalMcpToolDefinition {
            id: Uuid::new_v4(),
            attachment_id,
            kind: ToolDefinitionKind::Proxy,
            urn,
            name: PROXY_TOOL_NAME.to_string(),
            untruncated_name: PROXY_TOOL_NAME.to_string(),
            description: details.description.clone(),
            input_schema: Value::Null,
            annotations: None,
            remote_url: details.remote_url.clone(),
            transport: details.transport_type,
            requires_oauth,
            oauth,
            header_defs: details.headers.clone(),
        }]);
    }

    let mut definitions = Vec::with_capacity(details.tools.len());
    for tool in &details.tools {
        if tool.name.contains(PROXY_DELIMITER) {
            // No escape mechanism exists for the proxy delimiter; such a
            // name would misroute at call time.
            return Err(CatalogError::ReservedDelimiter(tool.name.clone()));
        }

        let name = sanitize(&tool.name);
        let urn = ToolUrn::new(ToolKind::ExternalMcp, slug, name.as_str());
        urn.validate()?;

        definitions.push(ExternalMcpToolDefinition {
            id: Uuid::new_v4(),
            attachment_id,
            kind: ToolDefinitionKind::Direct,
            urn,
            name: name.as_str().to_string(),
            untruncated_name: name.untruncated().to_string(),
            description: tool.description.clone(),
            input_schema: tool.input_schema.clone(),
            annotations: None,
            remote_url: details.remote_url.clone(),
            transport: details.transport_type,
            requires_oauth,
            oauth: oauth.clone(),
            header_defs: details.headers.clone(),
        });
    }

    Ok(definitions)
}
