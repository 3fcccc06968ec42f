//! MCP client session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{McpError, McpResult};
use crate::protocol::{
    CallToolParams, InitializeParams, InitializeResult, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, McpTool, ToolCallResult,
};
use crate::sse::SseTransport;
use crate::streamable::StreamableHttpTransport;
use crate::transport::{AuthState, ClientOptions, Transport, TransportType};

/// A single MCP session against one remote server.
///
/// Owned by one task for its lifetime; sessions are not shared. Connecting
/// runs the `initialize` / `notifications/initialized` handshake; an auth
/// rejection anywhere surfaces as [`McpError::AuthRejected`] and the session
/// stays rejected until closed.
#[derive(Debug)]
pub struct McpClient {
    remote_url: String,
    transport: Arc<dyn Transport>,
    server_info: InitializeResult,
    next_id: AtomicU64,
}

impl McpClient {
    /// Connect and run the initialization handshake.
    pub async fn connect(
        remote_url: impl Into<String>,
        transport_type: TransportType,
        options: ClientOptions,
    ) -> McpResult<Self> {
        let remote_url = remote_url.into();
        let auth = Arc::new(AuthState::new(remote_url.clone()));

        info!(url = %remote_url, transport = %transport_type, "Connecting to MCP server");

        let transport: Arc<dyn Transport> = match transport_type {
            TransportType::StreamableHttp => Arc::new(StreamableHttpTransport::new(
                remote_url.clone(),
                options,
                Arc::clone(&auth),
            )?),
            TransportType::Sse => Arc::new(
                SseTransport::connect(remote_url.clone(), options, Arc::clone(&auth)).await?,
            ),
        };

        let next_id = AtomicU64::new(1);
        let request = JsonRpcRequest::new(
            next_id.fetch_add(1, Ordering::SeqCst),
            "initialize",
            Some(serde_json::to_value(InitializeParams::default())?),
        );

        let response = transport.request(request).await?;
        let server_info: InitializeResult = decode_result(response, "initialize")?;

        debug!(
            url = %remote_url,
            protocol_version = %server_info.protocol_version,
            server = %server_info.server_info.name,
            "MCP server initialized"
        );

        transport
            .notify(JsonRpcNotification::new("notifications/initialized", None))
            .await?;

        Ok(Self {
            remote_url,
            transport,
            server_info,
            next_id,
        })
    }

    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    /// Identity and capabilities the server reported during initialize.
    pub fn server_info(&self) -> &InitializeResult {
        &self.server_info
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// List the tools the server exposes.
    pub async fn list_tools(&self) -> McpResult<Vec<McpTool>> {
        let request = JsonRpcRequest::new(self.next_request_id(), "tools/list", None);
        let response = self.transport.request(request).await?;
        let result: ListToolsResult = decode_result(response, "tools/list")?;

        debug!(url = %self.remote_url, tool_count = result.tools.len(), "Listed MCP tools");
        Ok(result.tools)
    }

    /// Call a tool by its upstream name.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> McpResult<ToolCallResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let request = JsonRpcRequest::new(
            self.next_request_id(),
            "tools/call",
            Some(serde_json::to_value(&params)?),
        );

        let response = self.transport.request(request).await?;
        if let Some(error) = response.error {
            return Err(McpError::tool_error(format!(
                "{name}: {} (code {})",
                error.message, error.code
            )));
        }

        let result: ToolCallResult = serde_json::from_value(
            response
                .result
                .ok_or_else(|| McpError::protocol_error("Missing tools/call result"))?,
        )
        .map_err(|e| McpError::protocol_error(e.to_string()))?;

        Ok(result)
    }

    /// Close the session, stopping any background readers.
    pub async fn close(&self) -> McpResult<()> {
        self.transport.close().await
    }
}

fn decode_result<T: serde::de::DeserializeOwned>(
    response: JsonRpcResponse,
    method: &str,
) -> McpResult<T> {
    if let Some(error) = response.error {
        if method == "initialize" {
            return Err(McpError::InitializationFailed(error.message));
        }
        return Err(McpError::protocol_error(format!(
            "{method} failed: {} (code {})",
            error.message, error.code
        )));
    }

    serde_json::from_value(
        response
            .result
            .ok_or_else(|| McpError::protocol_error(format!("Missing {method} result")))?,
    )
    .map_err(|e| McpError::protocol_error(format!("Bad {method} result: {e}")))
}
