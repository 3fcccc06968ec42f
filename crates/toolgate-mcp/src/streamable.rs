//! Streamable-HTTP transport.
//!
//! Requests are POSTed to the remote endpoint as JSON-RPC; the response
//! arrives in the HTTP response body, either as plain JSON (single object or
//! batch array) or as an SSE-framed body whose `data:` lines carry the
//! JSON-RPC responses. Correlation is by JSON-RPC `id`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{McpError, McpResult};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::transport::{AuthState, ClientOptions, Transport};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Streamable-HTTP transport for remote MCP servers.
#[derive(Debug)]
pub struct StreamableHttpTransport {
    url: String,
    options: ClientOptions,
    client: Client,
    auth: Arc<AuthState>,
    /// Session id assigned by the server, echoed on subsequent requests.
    session_id: RwLock<Option<String>>,
}

impl StreamableHttpTransport {
    pub fn new(
        url: impl Into<String>,
        options: ClientOptions,
        auth: Arc<AuthState>,
    ) -> McpResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| McpError::connection_failed(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            options,
            client,
            auth,
            session_id: RwLock::new(None),
        })
    }

    async fn build_request(&self, body: String) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .body(body);

        if let Some(ref auth) = self.options.authorization {
            req = req.header("Authorization", auth.clone());
        }

        for (name, value) in &self.options.headers {
            req = req.header(name, value);
        }

        if let Some(ref session) = *self.session_id.read().await {
            req = req.header("Mcp-Session-Id", session.clone());
        }

        req
    }

    async fn dispatch(&self, body: String) -> McpResult<reqwest::Response> {
        self.auth.check()?;

        let response = self.build_request(body).await.send().await.map_err(|e| {
            if e.is_timeout() {
                McpError::Timeout
            } else {
                McpError::connection_failed(format!("Request to {} failed: {e}", self.url))
            }
        })?;

        let www_authenticate = response
            .headers()
            .get("www-authenticate")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.auth
            .intercept(response.status(), www_authenticate.as_deref())?;

        if let Some(session) = response
            .headers()
            .get("mcp-session-id")
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.write().await = Some(session.to_string());
        }

        Ok(response)
    }

    /// Extract the response with the given id from a JSON or SSE body.
    async fn read_response(&self, response: reqwest::Response, id: u64) -> McpResult<JsonRpcResponse> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::protocol_error(format!(
                "Server returned {status}: {}",
                preview(&body)
            )));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.contains("text/event-stream") {
            return self.read_sse_body(response, id).await;
        }

        let text = response
            .text()
            .await
            .map_err(|e| McpError::protocol_error(format!("Failed to read response: {e}")))?;

        match_response(&text, id)
            .ok_or_else(|| McpError::protocol_error(format!("No response for request {id}")))
    }

    /// Scan an SSE-framed body for the response with our id.
    async fn read_sse_body(&self, response: reqwest::Response, id: u64) -> McpResult<JsonRpcResponse> {
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| McpError::protocol_error(format!("Stream error: {e}")))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            let consumed = buffer.rfind('\n').map(|i| i + 1).unwrap_or(0);
            for line in buffer[..consumed].lines() {
                if let Some(data) = line.strip_prefix("data:") {
                    if let Some(found) = match_response(data.trim_start(), id) {
                        return Ok(found);
                    }
                }
            }
            buffer.drain(..consumed);
        }

        Err(McpError::protocol_error(format!(
            "Response stream ended without a reply to request {id}"
        )))
    }
}

/// Parse a JSON-RPC body (single object or batch array) and pick out the
/// response with the given id.
fn match_response(text: &str, id: u64) -> Option<JsonRpcResponse> {
    if let Ok(single) = serde_json::from_str::<JsonRpcResponse>(text) {
        if single.id == id {
            return Some(single);
        }
    }
    if let Ok(batch) = serde_json::from_str::<Vec<JsonRpcResponse>>(text) {
        return batch.into_iter().find(|r| r.id == id);
    }
    None
}

fn preview(body: &str) -> &str {
    let end = body
        .char_indices()
        .take_while(|(i, _)| *i < 256)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    &body[..end]
}

#[async_trait]
impl Transport for StreamableHttpTransport {
    async fn request(&self, request: JsonRpcRequest) -> McpResult<JsonRpcResponse> {
        let id = request.id;
        let body = serde_json::to_string(&request)?;
        debug!(id, method = %request.method, url = %self.url, "Sending streamable-HTTP request");

        let response = self.dispatch(body).await?;
        self.read_response(response, id).await
    }

    async fn notify(&self, notification: JsonRpcNotification) -> McpResult<()> {
        let body = serde_json::to_string(&notification)?;
        debug!(method = %notification.method, url = %self.url, "Sending streamable-HTTP notification");

        let response = self.dispatch(body).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::protocol_error(format!(
                "Notification rejected with {status}: {}",
                preview(&body)
            )));
        }

        Ok(())
    }

    async fn close(&self) -> McpResult<()> {
        // Stateless per-request transport: drop the session id and let the
        // server expire the session.
        *self.session_id.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_response_single() {
        let body = r#"{"jsonrpc":"2.0","id":3,"result":{"ok":true}}"#;
        assert!(match_response(body, 3).is_some());
        assert!(match_response(body, 4).is_none());
    }

    #[test]
    fn test_match_response_batch() {
        let body = r#"[
            {"jsonrpc":"2.0","id":1,"result":{}},
            {"jsonrpc":"2.0","id":2,"result":{"tools":[]}}
        ]"#;
        let found = match_response(body, 2).unwrap();
        assert_eq!(found.id, 2);
        assert!(found.result.is_some());
    }

    #[test]
    fn test_match_response_garbage() {
        assert!(match_response("not json", 1).is_none());
    }

    #[test]
    fn test_preview_bounds_body() {
        let long = "x".repeat(1000);
        assert_eq!(preview(&long).len(), 256);
        assert_eq!(preview("short"), "short");
    }
}
