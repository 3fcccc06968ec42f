//! Proxy executor: lazy expansion of proxied MCP servers.
//!
//! Proxied tools are named `<slug>--<external_tool_name>`. The executor
//! owns one entry per proxy definition in a toolset; it answers
//! [`ProxyExecutor::matches`] for incoming call names, expands every entry
//! into its live upstream tool list for [`ProxyExecutor::list_all`], and
//! forwards calls through a fresh MCP session.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use toolgate_mcp::{ClientOptions, McpClient, McpTool, ToolCallResult, TransportType};
use toolgate_registry::HeaderDefinition;
use toolgate_urn::ToolUrn;

use crate::env::CiEnv;
use crate::error::{ProxyError, ProxyResult};
use crate::headers::build_headers;

pub use toolgate_urn::PROXY_DELIMITER;

/// One proxy-typed tool definition owned by the executor.
#[derive(Debug, Clone)]
pub struct ProxyEntry {
    pub urn: ToolUrn,
    /// The attachment slug; equals the URN source segment.
    pub slug: String,
}

impl ProxyEntry {
    pub fn new(urn: ToolUrn) -> Self {
        let slug = urn.source().to_string();
        Self { urn, slug }
    }
}

/// Everything needed to execute one proxied call.
#[derive(Debug, Clone)]
pub struct Plan {
    pub remote_url: String,
    /// The upstream tool name (without the `<slug>--` prefix).
    pub tool_name: String,
    pub slug: String,
    pub transport: TransportType,
    pub requires_oauth: bool,
    pub header_defs: Vec<HeaderDefinition>,
}

/// Fresh plan inputs for a tool URN, straight from storage.
#[derive(Debug, Clone)]
pub struct PlanInputs {
    pub remote_url: String,
    pub transport: TransportType,
    pub requires_oauth: bool,
    pub header_defs: Vec<HeaderDefinition>,
}

/// Maps a tool URN plus project to fresh [`PlanInputs`].
#[async_trait]
pub trait PlanResolver: Send + Sync {
    async fn resolve(&self, urn: &ToolUrn, project_id: Uuid) -> ProxyResult<PlanInputs>;
}

/// Loads the merged source+toolset system environment for an entry.
#[async_trait]
pub trait EnvLoader: Send + Sync {
    async fn load(&self, project_id: Uuid, urn: &ToolUrn) -> ProxyResult<CiEnv>;
}

/// Executor over the proxy definitions of one toolset.
pub struct ProxyExecutor {
    entries: Vec<ProxyEntry>,
}

impl ProxyExecutor {
    pub fn new(entries: Vec<ProxyEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ProxyEntry] {
        &self.entries
    }

    /// Return an execution plan when `tool_call_name` belongs to one of our
    /// entries, `None` when it does not parse as `<slug>--<tool>` or the
    /// slug is not ours.
    pub async fn matches(
        &self,
        tool_call_name: &str,
        project_id: Uuid,
        resolver: &dyn PlanResolver,
    ) -> ProxyResult<Option<Plan>> {
        let Some((slug, external_name)) = tool_call_name.split_once(PROXY_DELIMITER) else {
            return Ok(None);
        };
        if external_name.is_empty() {
            return Ok(None);
        }

        let Some(entry) = self.entries.iter().find(|e| e.slug == slug) else {
            return Ok(None);
        };

        let inputs = resolver.resolve(&entry.urn, project_id).await?;
        Ok(Some(Plan {
            remote_url: inputs.remote_url,
            tool_name: external_name.to_string(),
            slug: entry.slug.clone(),
            transport: inputs.transport,
            requires_oauth: inputs.requires_oauth,
            header_defs: inputs.header_defs,
        }))
    }

    /// Expand every entry into its live upstream tool list, prefixing names
    /// with `<slug>--`. Per-entry failures are logged and skipped; this
    /// never fails as a whole.
    #[allow(clippy::too_many_arguments)]
    pub async fn list_all(
        &self,
        project_id: Uuid,
        user_config: &HashMap<String, String>,
        oauth_token: Option<&str>,
        env_loader: &dyn EnvLoader,
        resolver: &dyn PlanResolver,
    ) -> Vec<McpTool> {
        let mut tools = Vec::new();

        for entry in &self.entries {
            match self
                .list_entry(entry, project_id, user_config, oauth_token, env_loader, resolver)
                .await
            {
                Ok(mut entry_tools) => tools.append(&mut entry_tools),
                Err(e) => {
                    warn!(slug = %entry.slug, error = %e, "Skipping proxy entry");
                }
            }
        }

        tools
    }

    async fn list_entry(
        &self,
        entry: &ProxyEntry,
        project_id: Uuid,
        user_config: &HashMap<String, String>,
        oauth_token: Option<&str>,
        env_loader: &dyn EnvLoader,
        resolver: &dyn PlanResolver,
    ) -> ProxyResult<Vec<McpTool>> {
        let inputs = resolver.resolve(&entry.urn, project_id).await?;
        let system_env = env_loader.load(project_id, &entry.urn).await?;

        let token = inputs.requires_oauth.then_some(oauth_token).flatten();
        let options = client_options(&system_env, user_config, &inputs.header_defs, token);

        let client =
            McpClient::connect(inputs.remote_url.clone(), inputs.transport, options).await?;
        let result = client.list_tools().await;
        let _ = client.close().await;

        let mut tools = result?;
        for tool in &mut tools {
            tool.name = format!("{}{PROXY_DELIMITER}{}", entry.slug, tool.name);
        }

        debug!(slug = %entry.slug, tool_count = tools.len(), "Expanded proxy entry");
        Ok(tools)
    }

    /// Forward one call through a fresh session per the plan.
    pub async fn call(
        &self,
        plan: &Plan,
        arguments: Option<Value>,
        system_env: &CiEnv,
        user_config: &HashMap<String, String>,
        oauth_token: Option<&str>,
    ) -> ProxyResult<ToolCallResult> {
        let token = plan.requires_oauth.then_some(oauth_token).flatten();
        let options = client_options(system_env, user_config, &plan.header_defs, token);

        let client =
            McpClient::connect(plan.remote_url.clone(), plan.transport, options).await?;
        let result = client.call_tool(&plan.tool_name, arguments).await;
        let _ = client.close().await;

        Ok(result?)
    }
}

/// Compose headers and split the `Authorization` value into the dedicated
/// option slot.
fn client_options(
    system_env: &CiEnv,
    user_config: &HashMap<String, String>,
    header_defs: &[HeaderDefinition],
    oauth_token: Option<&str>,
) -> ClientOptions {
    let mut headers = build_headers(system_env, user_config, header_defs, oauth_token);
    let authorization = headers.remove("Authorization");
    ClientOptions {
        authorization,
        headers,
    }
}
