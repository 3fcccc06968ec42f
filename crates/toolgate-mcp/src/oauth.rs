//! OAuth metadata discovery for remote MCP servers.
//!
//! Given a `WWW-Authenticate` challenge and the server URL, works out which
//! OAuth flavor the server supports: `2.1` (RFC 8414 metadata discovery plus
//! dynamic client registration, fully automatable), `2.0` (legacy, needs
//! manual client setup), or `none`.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{McpError, McpResult};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// `key="value"` parameters inside a `WWW-Authenticate` challenge.
static AUTH_PARAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\w+)="([^"]*)""#).expect("valid auth param regex"));

/// OAuth flavor supported by a remote server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OAuthVersion {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "2.0")]
    V2_0,
    #[serde(rename = "2.1")]
    V2_1,
}

impl OAuthVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::V2_0 => "2.0",
            Self::V2_1 => "2.1",
        }
    }
}

impl std::fmt::Display for OAuthVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a discovery pass. `version == None` is a valid outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthDiscovery {
    pub version: OAuthVersion,
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
    pub registration_endpoint: Option<String>,
    pub scopes_supported: Vec<String>,
}

/// RFC 8414 authorization-server metadata (fields we consume).
#[derive(Debug, Clone, Deserialize)]
struct AuthServerMetadata {
    authorization_endpoint: Option<String>,
    token_endpoint: Option<String>,
    registration_endpoint: Option<String>,
    #[serde(default)]
    scopes_supported: Vec<String>,
}

/// RFC 9728 protected-resource metadata (fields we consume).
#[derive(Debug, Clone, Deserialize)]
struct ProtectedResourceMetadata {
    #[serde(default)]
    authorization_servers: Vec<String>,
    #[serde(default)]
    scopes_supported: Vec<String>,
}

/// Parse `key="value"` parameters from a `WWW-Authenticate` header,
/// tolerating the scheme prefix and interleaved parameters.
fn parse_www_authenticate(header: &str) -> Vec<(String, String)> {
    AUTH_PARAM_RE
        .captures_iter(header)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

fn auth_param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Discover the OAuth metadata for a server that answered 401.
///
/// Tries, in order: the challenge's `auth_server_metadata` URL, the
/// challenge's `resource_metadata` URL, then well-known probes at the
/// server's origin. Network and parse errors are swallowed between
/// strategies; the fallback result carries `version: none`.
pub async fn discover_oauth_metadata(
    www_authenticate: Option<&str>,
    remote_url: &str,
) -> OAuthDiscovery {
    let client = Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .unwrap_or_default();

    let params = www_authenticate
        .map(parse_www_authenticate)
        .unwrap_or_default();

    // Strategy 1: the challenge names the AS metadata document directly.
    if let Some(url) = auth_param(&params, "auth_server_metadata") {
        if let Ok(metadata) = fetch_auth_server_metadata(&client, url).await {
            return from_auth_server(metadata);
        }
    }

    // Strategy 2: the challenge names the protected-resource document.
    if let Some(url) = auth_param(&params, "resource_metadata") {
        if let Some(found) = follow_resource_metadata(&client, url).await {
            return found;
        }
    }

    // Strategy 3: probe the well-known locations at the server origin.
    if let Some(origin) = server_origin(remote_url) {
        let pr_url = format!("{origin}/.well-known/oauth-protected-resource");
        if let Some(found) = follow_resource_metadata(&client, &pr_url).await {
            return found;
        }

        let as_url = format!("{origin}/.well-known/oauth-authorization-server");
        if let Ok(metadata) = fetch_auth_server_metadata(&client, &as_url).await {
            return from_auth_server(metadata);
        }
    }

    debug!(url = %remote_url, "No OAuth metadata discovered");
    OAuthDiscovery::default()
}

/// Follow a protected-resource document to its first authorization server;
/// if the AS metadata cannot be fetched, fall back to a 2.0 result carrying
/// the resource document's scopes.
async fn follow_resource_metadata(client: &Client, url: &str) -> Option<OAuthDiscovery> {
    let resource = fetch_protected_resource(client, url).await.ok()?;

    if let Some(auth_server) = resource.authorization_servers.first() {
        let as_url = format!(
            "{}/.well-known/oauth-authorization-server",
            auth_server.trim_end_matches('/')
        );
        if let Ok(metadata) = fetch_auth_server_metadata(client, &as_url).await {
            return Some(from_auth_server(metadata));
        }
    }

    // Only the resource document resolved: legacy OAuth with its scopes.
    Some(OAuthDiscovery {
        version: OAuthVersion::V2_0,
        scopes_supported: resource.scopes_supported,
        ..OAuthDiscovery::default()
    })
}

fn from_auth_server(metadata: AuthServerMetadata) -> OAuthDiscovery {
    let version = if metadata.registration_endpoint.is_some() {
        OAuthVersion::V2_1
    } else {
        OAuthVersion::V2_0
    };

    OAuthDiscovery {
        version,
        authorization_endpoint: metadata.authorization_endpoint,
        token_endpoint: metadata.token_endpoint,
        registration_endpoint: metadata.registration_endpoint,
        scopes_supported: metadata.scopes_supported,
    }
}

async fn fetch_auth_server_metadata(client: &Client, url: &str) -> McpResult<AuthServerMetadata> {
    debug!(url = %url, "Fetching authorization-server metadata");
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(McpError::protocol_error(format!(
            "AS metadata fetch returned {}",
            response.status()
        )));
    }
    Ok(response.json().await?)
}

async fn fetch_protected_resource(
    client: &Client,
    url: &str,
) -> McpResult<ProtectedResourceMetadata> {
    debug!(url = %url, "Fetching protected-resource metadata");
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(McpError::protocol_error(format!(
            "PR metadata fetch returned {}",
            response.status()
        )));
    }
    Ok(response.json().await?)
}

fn server_origin(remote_url: &str) -> Option<String> {
    let url = Url::parse(remote_url).ok()?;
    let host = url.host_str()?;
    let mut origin = format!("{}://{host}", url.scheme());
    if let Some(port) = url.port() {
        origin.push_str(&format!(":{port}"));
    }
    Some(origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_www_authenticate_with_scheme() {
        let params = parse_www_authenticate(
            r#"Bearer realm="mcp", resource_metadata="https://rs.example.com/.well-known/oauth-protected-resource""#,
        );
        assert_eq!(auth_param(&params, "realm"), Some("mcp"));
        assert_eq!(
            auth_param(&params, "resource_metadata"),
            Some("https://rs.example.com/.well-known/oauth-protected-resource")
        );
        assert_eq!(auth_param(&params, "missing"), None);
    }

    #[test]
    fn test_parse_www_authenticate_interleaved() {
        let params =
            parse_www_authenticate(r#"Bearer error="invalid_token", auth_server_metadata="https://as.example.com/meta", scope="mcp""#);
        assert_eq!(
            auth_param(&params, "auth_server_metadata"),
            Some("https://as.example.com/meta")
        );
        assert_eq!(auth_param(&params, "scope"), Some("mcp"));
    }

    #[test]
    fn test_server_origin() {
        assert_eq!(
            server_origin("https://mcp.example.com/api/mcp").as_deref(),
            Some("https://mcp.example.com")
        );
        assert_eq!(
            server_origin("http://localhost:8080/sse").as_deref(),
            Some("http://localhost:8080")
        );
        assert_eq!(server_origin("not a url"), None);
    }

    #[test]
    fn test_oauth_version_serde() {
        assert_eq!(serde_json::to_string(&OAuthVersion::V2_1).unwrap(), "\"2.1\"");
        assert_eq!(
            serde_json::from_str::<OAuthVersion>("\"none\"").unwrap(),
            OAuthVersion::None
        );
    }

    #[tokio::test]
    async fn test_discovery_via_auth_server_metadata_param() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/meta"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "authorization_endpoint": "https://as.example.com/authorize",
                "token_endpoint": "https://as.example.com/token",
                "registration_endpoint": "https://as.example.com/register",
                "scopes_supported": ["mcp"]
            })))
            .mount(&server)
            .await;

        let header = format!(r#"Bearer auth_server_metadata="{}/meta""#, server.uri());
        let found = discover_oauth_metadata(Some(&header), "https://mcp.example.com/api").await;

        assert_eq!(found.version, OAuthVersion::V2_1);
        assert_eq!(
            found.registration_endpoint.as_deref(),
            Some("https://as.example.com/register")
        );
        assert_eq!(found.scopes_supported, vec!["mcp"]);
    }

    #[tokio::test]
    async fn test_discovery_without_registration_is_v2_0() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/meta"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "authorization_endpoint": "https://as.example.com/authorize",
                "token_endpoint": "https://as.example.com/token"
            })))
            .mount(&server)
            .await;

        let header = format!(r#"Bearer auth_server_metadata="{}/meta""#, server.uri());
        let found = discover_oauth_metadata(Some(&header), "https://mcp.example.com/api").await;

        assert_eq!(found.version, OAuthVersion::V2_0);
        assert_eq!(found.registration_endpoint, None);
    }

    #[tokio::test]
    async fn test_discovery_resource_metadata_with_unreachable_as_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-protected-resource"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "authorization_servers": [format!("{}/as", server.uri())],
                "scopes_supported": ["read", "write"]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/as/.well-known/oauth-authorization-server"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let header = format!(
            r#"Bearer resource_metadata="{}/.well-known/oauth-protected-resource""#,
            server.uri()
        );
        let found = discover_oauth_metadata(Some(&header), &server.uri()).await;

        assert_eq!(found.version, OAuthVersion::V2_0);
        assert_eq!(found.scopes_supported, vec!["read", "write"]);
        assert_eq!(found.authorization_endpoint, None);
    }

    #[tokio::test]
    async fn test_discovery_well_known_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-protected-resource"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-authorization-server"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "authorization_endpoint": format!("{}/authorize", server.uri()),
                "token_endpoint": format!("{}/token", server.uri()),
                "registration_endpoint": format!("{}/register", server.uri())
            })))
            .mount(&server)
            .await;

        let found = discover_oauth_metadata(None, &format!("{}/api/mcp", server.uri())).await;

        assert_eq!(found.version, OAuthVersion::V2_1);
        assert!(found.token_endpoint.unwrap().ends_with("/token"));
    }

    #[tokio::test]
    async fn test_discovery_nothing_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let found = discover_oauth_metadata(None, &server.uri()).await;
        assert_eq!(found, OAuthDiscovery::default());
        assert_eq!(found.version, OAuthVersion::None);
    }
}
