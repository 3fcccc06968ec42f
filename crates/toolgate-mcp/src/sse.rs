//! Legacy SSE transport.
//!
//! The client opens a GET to the remote endpoint and keeps the stream for
//! the life of the session. The server's first `event: endpoint` frame
//! names the URL to POST requests to; POSTs are acknowledged with `202
//! Accepted` and the actual JSON-RPC responses arrive as `event: message`
//! frames on the stream, demultiplexed here by JSON-RPC id. A `DELETE` to
//! the endpoint signals clean disconnection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::error::{McpError, McpResult};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::transport::{AuthState, ClientOptions, Transport};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// SSE transport for remote MCP servers.
#[derive(Debug)]
pub struct SseTransport {
    endpoint: String,
    options: ClientOptions,
    client: Client,
    auth: Arc<AuthState>,
    pending: PendingMap,
    cancel: CancellationToken,
    /// Set when the background reader exits; operations fail fast after.
    closed: Arc<AtomicBool>,
}

impl SseTransport {
    /// Open the stream and wait for the endpoint negotiation.
    pub async fn connect(
        url: impl Into<String>,
        options: ClientOptions,
        auth: Arc<AuthState>,
    ) -> McpResult<Self> {
        let url = url.into();
        // No client-wide timeout: the GET stream lives for the whole
        // session. POSTs are bounded individually.
        let client = Client::new();

        let mut req = client.get(&url).header("Accept", "text/event-stream");
        if let Some(ref authz) = options.authorization {
            req = req.header("Authorization", authz.clone());
        }
        for (name, value) in &options.headers {
            req = req.header(name, value);
        }

        let response = req.send().await.map_err(|e| {
            McpError::connection_failed(format!("Failed to open SSE stream to {url}: {e}"))
        })?;

        let www_authenticate = response
            .headers()
            .get("www-authenticate")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        auth.intercept(response.status(), www_authenticate.as_deref())?;

        let status = response.status();
        if !status.is_success() {
            return Err(McpError::connection_failed(format!(
                "SSE stream to {url} returned {status}"
            )));
        }

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let cancel = CancellationToken::new();
        let closed = Arc::new(AtomicBool::new(false));
        let (endpoint_tx, endpoint_rx) = oneshot::channel::<String>();

        tokio::spawn(read_stream(
            response,
            url.clone(),
            Some(endpoint_tx),
            Arc::clone(&pending),
            cancel.clone(),
            Arc::clone(&closed),
        ));

        let endpoint = tokio::time::timeout(REQUEST_TIMEOUT, endpoint_rx)
            .await
            .map_err(|_| McpError::Timeout)?
            .map_err(|_| {
                McpError::connection_failed(format!(
                    "SSE stream to {url} closed before endpoint negotiation"
                ))
            })?;

        debug!(url = %url, endpoint = %endpoint, "SSE endpoint negotiated");

        Ok(Self {
            endpoint,
            options,
            client,
            auth,
            pending,
            cancel,
            closed,
        })
    }

    fn build_post(&self, body: String) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(&self.endpoint)
            .timeout(REQUEST_TIMEOUT)
            .header("Content-Type", "application/json")
            .body(body);

        if let Some(ref authz) = self.options.authorization {
            req = req.header("Authorization", authz.clone());
        }
        for (name, value) in &self.options.headers {
            req = req.header(name, value);
        }

        req
    }

    async fn post(&self, body: String) -> McpResult<()> {
        self.auth.check()?;
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::Closed);
        }

        let response = self.build_post(body).send().await.map_err(|e| {
            if e.is_timeout() {
                McpError::Timeout
            } else {
                McpError::connection_failed(format!("POST to {} failed: {e}", self.endpoint))
            }
        })?;

        let www_authenticate = response
            .headers()
            .get("www-authenticate")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.auth
            .intercept(response.status(), www_authenticate.as_deref())?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(McpError::protocol_error(format!(
                "Server returned {status}: {text}"
            )));
        }

        Ok(())
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        // The reader must not outlive the transport even when close() was
        // never called, e.g. when the initialize handshake fails.
        self.cancel.cancel();
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn request(&self, request: JsonRpcRequest) -> McpResult<JsonRpcResponse> {
        let id = request.id;
        let body = serde_json::to_string(&request)?;
        debug!(id, method = %request.method, "Sending SSE request");

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);

        if let Err(e) = self.post(body).await {
            self.pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&id);
            return Err(e);
        }

        let result = tokio::select! {
            response = rx => response.map_err(|_| {
                McpError::connection_failed("SSE stream closed while awaiting response")
            }),
            () = self.cancel.cancelled() => Err(McpError::Closed),
            () = tokio::time::sleep(REQUEST_TIMEOUT) => Err(McpError::Timeout),
        };

        if result.is_err() {
            self.pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&id);
        }
        result
    }

    async fn notify(&self, notification: JsonRpcNotification) -> McpResult<()> {
        let body = serde_json::to_string(&notification)?;
        debug!(method = %notification.method, "Sending SSE notification");
        self.post(body).await
    }

    async fn close(&self) -> McpResult<()> {
        self.cancel.cancel();
        self.closed.store(true, Ordering::SeqCst);

        // Best-effort clean disconnect.
        if let Err(e) = self
            .client
            .delete(&self.endpoint)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            debug!(endpoint = %self.endpoint, error = %e, "SSE disconnect DELETE failed");
        }

        Ok(())
    }
}

/// Background reader: parses SSE frames off the GET stream, resolves the
/// endpoint negotiation, and routes `message` frames to their waiters.
async fn read_stream(
    response: reqwest::Response,
    base_url: String,
    mut endpoint_tx: Option<oneshot::Sender<String>>,
    pending: PendingMap,
    cancel: CancellationToken,
    closed: Arc<AtomicBool>,
) {
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();
    let mut event = SseEvent::default();

    loop {
        let chunk = tokio::select! {
            chunk = stream.next() => chunk,
            () = cancel.cancelled() => break,
        };

        let Some(chunk) = chunk else { break };
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                warn!(url = %base_url, error = %e, "SSE stream error");
                break;
            }
        };

        buffer.push_str(&String::from_utf8_lossy(&chunk));

        let consumed = buffer.rfind('\n').map(|i| i + 1).unwrap_or(0);
        for line in buffer[..consumed].lines() {
            if let Some(frame) = event.feed(line) {
                handle_frame(&frame, &base_url, &mut endpoint_tx, &pending);
            }
        }
        buffer.drain(..consumed);
    }

    closed.store(true, Ordering::SeqCst);
    // Wake every waiter with a closed-stream error.
    pending.lock().unwrap_or_else(|e| e.into_inner()).clear();
    debug!(url = %base_url, "SSE reader stopped");
}

fn handle_frame(
    frame: &SseFrame,
    base_url: &str,
    endpoint_tx: &mut Option<oneshot::Sender<String>>,
    pending: &PendingMap,
) {
    match frame.event.as_str() {
        "endpoint" => {
            if let Some(tx) = endpoint_tx.take() {
                match resolve_endpoint(base_url, &frame.data) {
                    Ok(endpoint) => {
                        let _ = tx.send(endpoint);
                    }
                    Err(e) => warn!(url = %base_url, error = %e, "Bad SSE endpoint frame"),
                }
            }
        }
        "message" => match serde_json::from_str::<JsonRpcResponse>(&frame.data) {
            Ok(response) => {
                let waiter = pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&response.id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => debug!(id = response.id, "SSE response with no waiter"),
                }
            }
            Err(e) => warn!(error = %e, "Unparseable SSE message frame"),
        },
        other => debug!(event = %other, "Ignoring SSE event"),
    }
}

/// Resolve the negotiated endpoint, which may be absolute or relative.
fn resolve_endpoint(base_url: &str, data: &str) -> McpResult<String> {
    let base = Url::parse(base_url)
        .map_err(|e| McpError::protocol_error(format!("Invalid base URL {base_url:?}: {e}")))?;
    let resolved = base
        .join(data.trim())
        .map_err(|e| McpError::protocol_error(format!("Invalid endpoint {data:?}: {e}")))?;
    Ok(resolved.to_string())
}

/// Accumulates `event:`/`data:` lines into frames; a blank line dispatches.
#[derive(Default)]
struct SseEvent {
    event: Option<String>,
    data: Vec<String>,
}

struct SseFrame {
    event: String,
    data: String,
}

impl SseEvent {
    fn feed(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            if self.data.is_empty() {
                self.event = None;
                return None;
            }
            let frame = SseFrame {
                event: self.event.take().unwrap_or_else(|| "message".to_string()),
                data: self.data.join("\n"),
            };
            self.data.clear();
            return Some(frame);
        }

        if let Some(value) = line.strip_prefix("event:") {
            self.event = Some(value.trim_start().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data.push(value.trim_start().to_string());
        }
        // Comments and other fields are ignored.

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(input: &str) -> Vec<(String, String)> {
        let mut event = SseEvent::default();
        input
            .lines()
            .filter_map(|line| event.feed(line))
            .map(|f| (f.event, f.data))
            .collect()
    }

    #[test]
    fn test_event_parsing() {
        let got = frames("event: endpoint\ndata: /messages?session=abc\n\n");
        assert_eq!(got, vec![("endpoint".to_string(), "/messages?session=abc".to_string())]);
    }

    #[test]
    fn test_default_event_is_message() {
        let got = frames("data: {\"jsonrpc\":\"2.0\"}\n\n");
        assert_eq!(got[0].0, "message");
    }

    #[test]
    fn test_multiline_data_joined() {
        let got = frames("event: message\ndata: line1\ndata: line2\n\n");
        assert_eq!(got[0].1, "line1\nline2");
    }

    #[test]
    fn test_blank_lines_between_frames() {
        let got = frames("data: a\n\n\n\ndata: b\n\n");
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn test_comment_lines_ignored() {
        let got = frames(": keepalive\ndata: a\n\n");
        assert_eq!(got, vec![("message".to_string(), "a".to_string())]);
    }

    #[test]
    fn test_resolve_endpoint_relative() {
        let got = resolve_endpoint("https://mcp.example.com/sse", "/messages?session=1").unwrap();
        assert_eq!(got, "https://mcp.example.com/messages?session=1");
    }

    #[test]
    fn test_resolve_endpoint_absolute() {
        let got = resolve_endpoint("https://mcp.example.com/sse", "https://other.example.com/m")
            .unwrap();
        assert_eq!(got, "https://other.example.com/m");
    }
}
