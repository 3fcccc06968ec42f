//! End-to-end client tests against an in-process MCP server speaking both
//! remote transports.

use toolgate_mcp::{ClientOptions, McpClient, McpError, TransportType};
use toolgate_test_utils::{MockMcpServer, MockServerOptions, MockTool};

async fn connect(url: String, transport: TransportType) -> McpClient {
    McpClient::connect(url, transport, ClientOptions::default())
        .await
        .expect("connect")
}

#[tokio::test]
async fn test_streamable_http_full_session() {
    let server = MockMcpServer::start(vec![MockTool::get_weather()]).await;
    let client = connect(server.streamable_url(), TransportType::StreamableHttp).await;

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "get_weather");
    assert_eq!(tools[0].input_schema["required"], serde_json::json!(["location"]));

    let result = client
        .call_tool("get_weather", Some(serde_json::json!({"location": "SF"})))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.content[0]["text"], "sunny");

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_sse_full_session() {
    let server = MockMcpServer::start(vec![MockTool::get_weather()]).await;
    let client = connect(server.sse_url(), TransportType::Sse).await;

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "get_weather");

    let result = client
        .call_tool("get_weather", Some(serde_json::json!({"location": "SF"})))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.content[0]["text"], "sunny");

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_call_unknown_tool_is_tool_error() {
    let server = MockMcpServer::start(vec![MockTool::get_weather()]).await;
    let client = connect(server.streamable_url(), TransportType::StreamableHttp).await;

    let err = client.call_tool("nonexistent", None).await.unwrap_err();
    assert!(matches!(err, McpError::ToolError(_)), "got {err:?}");
}

#[tokio::test]
async fn test_streamable_connect_rejected_with_challenge() {
    let server = MockMcpServer::start_with(
        vec![MockTool::get_weather()],
        MockServerOptions {
            required_authorization: Some("Bearer good".to_string()),
            www_authenticate: Some(
                "Bearer resource_metadata=\"https://mcp.example.com/.well-known/oauth-protected-resource\"".to_string(),
            ),
        },
    )
    .await;

    let err = McpClient::connect(
        server.streamable_url(),
        TransportType::StreamableHttp,
        ClientOptions::default(),
    )
    .await
    .unwrap_err();

    match err {
        McpError::AuthRejected {
            status_code,
            www_authenticate,
            ..
        } => {
            assert_eq!(status_code, 401);
            assert!(www_authenticate.unwrap().contains("resource_metadata"));
        }
        other => panic!("expected AuthRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sse_connect_rejected_with_challenge() {
    let server = MockMcpServer::start_with(
        vec![MockTool::get_weather()],
        MockServerOptions {
            required_authorization: Some("Bearer good".to_string()),
            www_authenticate: Some("Bearer realm=\"mcp\"".to_string()),
        },
    )
    .await;

    let err = McpClient::connect(server.sse_url(), TransportType::Sse, ClientOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_auth_rejected(), "got {err:?}");
}

#[tokio::test]
async fn test_authorized_connect_sends_bearer() {
    let server = MockMcpServer::start_with(
        vec![MockTool::get_weather()],
        MockServerOptions {
            required_authorization: Some("Bearer good".to_string()),
            www_authenticate: None,
        },
    )
    .await;

    let client = McpClient::connect(
        server.streamable_url(),
        TransportType::StreamableHttp,
        ClientOptions {
            authorization: Some("Bearer good".to_string()),
            headers: Default::default(),
        },
    )
    .await
    .unwrap();

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);

    let captured = server.captured_headers();
    assert!(captured
        .iter()
        .all(|h| h.get("authorization").map(String::as_str) == Some("Bearer good")));
}

async fn wait_for_stream_count(server: &MockMcpServer, want: usize) {
    for _ in 0..100 {
        if server.open_sse_streams() == want {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    panic!(
        "SSE stream count stuck at {}, wanted {want}",
        server.open_sse_streams()
    );
}

#[tokio::test]
async fn test_sse_reader_stops_when_client_dropped() {
    let server = MockMcpServer::start(vec![MockTool::get_weather()]).await;
    let client = connect(server.sse_url(), TransportType::Sse).await;
    assert_eq!(server.open_sse_streams(), 1);

    // Dropping without close() must still stop the background reader and
    // release the stream connection.
    drop(client);
    wait_for_stream_count(&server, 0).await;
}

#[tokio::test]
async fn test_sse_close_stops_reader() {
    let server = MockMcpServer::start(vec![MockTool::get_weather()]).await;
    let client = connect(server.sse_url(), TransportType::Sse).await;
    assert_eq!(server.open_sse_streams(), 1);

    client.close().await.unwrap();
    wait_for_stream_count(&server, 0).await;
}

#[tokio::test]
async fn test_sse_stream_loss_fails_pending_operations() {
    let server = MockMcpServer::start(vec![MockTool::get_weather()]).await;
    let client = connect(server.sse_url(), TransportType::Sse).await;

    // The server drops the event stream; the next request either fails to
    // receive its response or fails fast once the reader has exited.
    server.drop_sse_sessions();

    let err = client.list_tools().await;
    assert!(err.is_err(), "expected failure after stream loss");
}
