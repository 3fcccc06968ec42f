//! In-process mock MCP server speaking both remote transports.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Query, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// A tool the mock server advertises, with a canned call response.
#[derive(Debug, Clone)]
pub struct MockTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    /// Content items returned from `tools/call`.
    pub content: Vec<Value>,
}

impl MockTool {
    /// The standard weather tool used across the test suites.
    pub fn get_weather() -> Self {
        Self {
            name: "get_weather".to_string(),
            description: "Get the current weather for a location".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"location": {"type": "string"}},
                "required": ["location"]
            }),
            content: vec![json!({"type": "text", "text": "sunny"})],
        }
    }
}

/// Behavior knobs for the mock server.
#[derive(Debug, Clone, Default)]
pub struct MockServerOptions {
    /// When set, requests without this exact `Authorization` value get 401
    /// with `www_authenticate` (if any) on the response.
    pub required_authorization: Option<String>,
    /// `WWW-Authenticate` header attached to 401 responses.
    pub www_authenticate: Option<String>,
}

struct MockState {
    tools: Vec<MockTool>,
    options: MockServerOptions,
    /// SSE sessions: session id to frame sender.
    sessions: Mutex<HashMap<String, mpsc::UnboundedSender<Event>>>,
    /// Headers seen on protocol requests, for assertions.
    captured_headers: Mutex<Vec<HashMap<String, String>>>,
    /// Currently-open SSE response streams.
    open_streams: AtomicUsize,
}

/// Decrements the open-stream count when the response stream is dropped.
struct StreamGuard(Arc<MockState>);

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An MCP server bound to an ephemeral local port.
pub struct MockMcpServer {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockMcpServer {
    /// Start a server advertising the given tools.
    pub async fn start(tools: Vec<MockTool>) -> Self {
        Self::start_with(tools, MockServerOptions::default()).await
    }

    /// Start a server with auth behavior configured.
    pub async fn start_with(tools: Vec<MockTool>, options: MockServerOptions) -> Self {
        let state = Arc::new(MockState {
            tools,
            options,
            sessions: Mutex::new(HashMap::new()),
            captured_headers: Mutex::new(Vec::new()),
            open_streams: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/mcp", post(handle_streamable))
            .route("/sse", get(handle_sse_open))
            .route("/messages", post(handle_sse_message).delete(handle_sse_disconnect))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock MCP server");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    /// Streamable-HTTP endpoint URL.
    pub fn streamable_url(&self) -> String {
        format!("http://{}/mcp", self.addr)
    }

    /// Legacy SSE endpoint URL.
    pub fn sse_url(&self) -> String {
        format!("http://{}/sse", self.addr)
    }

    /// SSE response streams currently held open by clients.
    pub fn open_sse_streams(&self) -> usize {
        self.state.open_streams.load(Ordering::SeqCst)
    }

    /// Drop every open SSE session, closing their event streams.
    pub fn drop_sse_sessions(&self) {
        self.state
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Headers seen on protocol requests so far.
    pub fn captured_headers(&self) -> Vec<HashMap<String, String>> {
        self.state
            .captured_headers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

fn capture_headers(state: &MockState, headers: &HeaderMap) {
    let map = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();
    state
        .captured_headers
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(map);
}

/// Check the Authorization requirement; Some = rejection response.
fn check_auth(state: &MockState, headers: &HeaderMap) -> Option<axum::response::Response> {
    let required = state.options.required_authorization.as_ref()?;
    let presented = headers.get("authorization").and_then(|v| v.to_str().ok());

    if presented == Some(required.as_str()) {
        return None;
    }

    let mut response = StatusCode::UNAUTHORIZED.into_response();
    if let Some(ref challenge) = state.options.www_authenticate {
        if let Ok(value) = challenge.parse() {
            response.headers_mut().insert("www-authenticate", value);
        }
    }
    Some(response)
}

/// Compute the JSON-RPC response for one request object, or None for
/// notifications.
fn respond(state: &MockState, message: &Value) -> Option<Value> {
    let id = message.get("id")?.clone();
    let method = message.get("method").and_then(Value::as_str).unwrap_or("");

    let result = match method {
        "initialize" => json!({
            "protocolVersion": "2025-03-26",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "mock-mcp", "version": "0.0.1"}
        }),
        "tools/list" => {
            let tools: Vec<Value> = state
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "inputSchema": t.input_schema
                    })
                })
                .collect();
            json!({"tools": tools})
        }
        "tools/call" => {
            let name = message
                .pointer("/params/name")
                .and_then(Value::as_str)
                .unwrap_or("");
            match state.tools.iter().find(|t| t.name == name) {
                Some(tool) => json!({"content": tool.content, "isError": false}),
                None => {
                    return Some(json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": {"code": -32602, "message": format!("unknown tool: {name}")}
                    }))
                }
            }
        }
        other => {
            return Some(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": format!("method not found: {other}")}
            }))
        }
    };

    Some(json!({"jsonrpc": "2.0", "id": id, "result": result}))
}

async fn handle_streamable(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    if let Some(rejection) = check_auth(&state, &headers) {
        return rejection;
    }
    capture_headers(&state, &headers);

    // Accept a single message or a batch.
    match &body {
        Value::Array(messages) => {
            let responses: Vec<Value> = messages
                .iter()
                .filter_map(|m| respond(&state, m))
                .collect();
            Json(Value::Array(responses)).into_response()
        }
        message => match respond(&state, message) {
            Some(response) => Json(response).into_response(),
            None => StatusCode::ACCEPTED.into_response(),
        },
    }
}

#[derive(serde::Deserialize)]
struct SessionQuery {
    session: String,
}

async fn handle_sse_open(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> axum::response::Response {
    if let Some(rejection) = check_auth(&state, &headers) {
        return rejection;
    }

    let session = Uuid::new_v4().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
    state
        .sessions
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(session.clone(), tx);
    debug!(session = %session, "Mock SSE session opened");

    state.open_streams.fetch_add(1, Ordering::SeqCst);
    let guard = StreamGuard(Arc::clone(&state));

    let endpoint = format!("/messages?session={session}");
    let stream: std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> =
        Box::pin(async_stream::stream! {
            let _guard = guard;
            yield Ok(Event::default().event("endpoint").data(endpoint));
            while let Some(event) = rx.recv().await {
                yield Ok(event);
            }
        });

    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

async fn handle_sse_message(
    State(state): State<Arc<MockState>>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    if let Some(rejection) = check_auth(&state, &headers) {
        return rejection;
    }
    capture_headers(&state, &headers);

    if let Some(response) = respond(&state, &body) {
        let sender = state
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&query.session)
            .cloned();
        match sender {
            Some(tx) => {
                let _ = tx.send(Event::default().event("message").data(response.to_string()));
            }
            None => return StatusCode::NOT_FOUND.into_response(),
        }
    }

    StatusCode::ACCEPTED.into_response()
}

async fn handle_sse_disconnect(
    State(state): State<Arc<MockState>>,
    RawQuery(query): RawQuery,
) -> StatusCode {
    let session = query
        .as_deref()
        .and_then(|q| q.strip_prefix("session="))
        .unwrap_or("");
    state
        .sessions
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(session);
    StatusCode::OK
}
