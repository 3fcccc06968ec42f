//! Builders for registry API payloads.
//!
//! The registry HTTP API returns the shapes below from
//! `GET /v0.1/servers` and `GET /v0.1/servers/{specifier}/versions/latest`;
//! tests mount these on a wiremock server.

use serde_json::{json, Value};
use uuid::Uuid;

/// One entry of a `servers` listing.
pub fn server_summary(id: Uuid, name: &str, description: &str) -> Value {
    json!({
        "server": {
            "name": name,
            "description": description,
            "version": "1.0.0",
            "title": name,
            "websiteUrl": format!("https://{name}.example.com"),
            "icons": [{"url": format!("https://{name}.example.com/icon.png")}]
        },
        "_meta": {"id": id}
    })
}

/// A `GET /v0.1/servers` response body.
pub fn list_servers_body(servers: Vec<Value>, next_cursor: Option<&str>) -> Value {
    let mut metadata = json!({"count": servers.len()});
    if let Some(cursor) = next_cursor {
        metadata["nextCursor"] = json!(cursor);
    }
    json!({"servers": servers, "metadata": metadata})
}

/// A `GET /v0.1/servers/{specifier}/versions/latest` response body.
/// `remotes` is a list of `(url, transport_type)` pairs.
pub fn server_details_body(name: &str, remotes: &[(&str, &str)]) -> Value {
    let remotes: Vec<Value> = remotes
        .iter()
        .map(|(url, transport)| json!({"url": url, "type": transport}))
        .collect();
    json!({
        "server": {
            "name": name,
            "description": format!("{name} MCP server"),
            "version": "1.0.0",
            "remotes": remotes
        }
    })
}
