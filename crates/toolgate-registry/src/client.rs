//! Registry HTTP client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::cache::{cache_key, MetadataCache};
use crate::error::{RegistryError, RegistryResult};
use crate::types::{
    DetailsResponse, ListServersRequest, ListServersResponse, Registry, ServerDetails,
    ServerSummary,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(500);
const PAGE_LIMIT: u32 = 50;

/// Client for the `v0.1/servers` registry API.
///
/// One instance is shared across tasks; concurrent calls are independent.
/// Responses are cached per (operation, URL, tenant headers) for the cache's
/// TTL.
pub struct RegistryClient {
    http: Client,
    backend: Arc<dyn Backend>,
    cache: Arc<dyn MetadataCache>,
}

impl RegistryClient {
    pub fn new(backend: Arc<dyn Backend>, cache: Arc<dyn MetadataCache>) -> RegistryResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::unexpected(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { http, backend, cache })
    }

    /// List servers, newest versions only, one page per call.
    pub async fn list_servers(
        &self,
        registry: &Registry,
        request: &ListServersRequest,
    ) -> RegistryResult<(Vec<ServerSummary>, Option<String>)> {
        let url = format!("{}/v0.1/servers", registry.url.trim_end_matches('/'));

        let mut query: Vec<(&str, String)> = vec![
            ("version", "latest".to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        if let Some(ref search) = request.search {
            query.push(("search", search.clone()));
        }
        if let Some(ref cursor) = request.cursor {
            query.push(("cursor", cursor.clone()));
        }

        let body = self.fetch("list", self.http.get(&url).query(&query)).await?;
        let parsed: ListServersResponse = serde_json::from_str(&body)
            .map_err(|e| RegistryError::invalid(format!("servers listing: {e}")))?;

        debug!(
            registry = %registry.name,
            count = parsed.metadata.count,
            "Listed registry servers"
        );

        let summaries = parsed
            .servers
            .into_iter()
            .map(|entry| entry.into_summary())
            .collect();
        Ok((summaries, parsed.metadata.next_cursor))
    }

    /// Resolve the latest version details for one server.
    pub async fn get_server_details(
        &self,
        registry: &Registry,
        specifier: &str,
    ) -> RegistryResult<ServerDetails> {
        let url = format!(
            "{}/v0.1/servers/{specifier}/versions/latest",
            registry.url.trim_end_matches('/')
        );

        let body = self.fetch("details", self.http.get(&url)).await?;
        let parsed: DetailsResponse = serde_json::from_str(&body)
            .map_err(|e| RegistryError::invalid(format!("server details: {e}")))?;

        parsed.server.into_details()
    }

    /// Authorize, consult the cache, and dispatch with bounded retries.
    async fn fetch(&self, prefix: &str, builder: reqwest::RequestBuilder) -> RegistryResult<String> {
        let mut request = builder
            .header("Accept", "application/json")
            .build()
            .map_err(|e| RegistryError::unexpected(format!("Failed to build request: {e}")))?;

        if self.backend.matches(&request) {
            self.backend.authorize(&mut request)?;
        }

        let url = request.url().to_string();
        let header_pairs: Vec<(String, String)> = request
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let key = cache_key(prefix, &url, &header_pairs);

        if let Some(cached) = self.cache.get(&key).await {
            debug!(url = %url, "Registry cache hit");
            return Ok(cached);
        }

        let host = request.url().host_str().unwrap_or("unknown").to_string();
        let mut last_failure = String::new();

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = BACKOFF_BASE * 2u32.pow(attempt - 1);
                warn!(url = %url, attempt, "Retrying registry request");
                tokio::time::sleep(delay).await;
            }

            let attempt_request = request
                .try_clone()
                .ok_or_else(|| RegistryError::unexpected("request not cloneable"))?;

            let response = match self.http.execute(attempt_request).await {
                Ok(response) => response,
                Err(e) => {
                    last_failure = e.to_string();
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() {
                last_failure = format!("upstream returned {status}");
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(status_error(status, &url, &body));
            }

            let body = response
                .text()
                .await
                .map_err(|e| RegistryError::unexpected(format!("Failed to read body: {e}")))?;

            self.cache.set(&key, body.clone()).await;
            return Ok(body);
        }

        Err(RegistryError::Gateway {
            host,
            message: last_failure,
        })
    }
}

fn status_error(status: StatusCode, url: &str, body: &str) -> RegistryError {
    let preview: String = body.chars().take(256).collect();
    match status {
        StatusCode::UNAUTHORIZED => RegistryError::Unauthorized(url.to_string()),
        StatusCode::FORBIDDEN => RegistryError::Forbidden(url.to_string()),
        StatusCode::NOT_FOUND => RegistryError::NotFound(url.to_string()),
        StatusCode::CONFLICT => RegistryError::Conflict(preview),
        other => RegistryError::BadRequest {
            status: other.as_u16(),
            message: preview,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{PassthroughBackend, TenantBackend};
    use crate::cache::{MemoryCache, NoopCache};
    use toolgate_test_utils::registry::{list_servers_body, server_details_body, server_summary};
    use uuid::Uuid;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registry(url: &str) -> Registry {
        Registry {
            id: Uuid::new_v4(),
            name: "test-registry".to_string(),
            url: url.to_string(),
        }
    }

    fn client() -> RegistryClient {
        RegistryClient::new(Arc::new(PassthroughBackend), Arc::new(NoopCache)).unwrap()
    }

    #[tokio::test]
    async fn test_list_servers() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path("/v0.1/servers"))
            .and(query_param("version", "latest"))
            .and(query_param("limit", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_servers_body(
                vec![server_summary(id, "acme", "Acme MCP server")],
                Some("cursor-2"),
            )))
            .mount(&server)
            .await;

        let (servers, next) = client()
            .list_servers(&registry(&server.uri()), &ListServersRequest::default())
            .await
            .unwrap();

        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].id, id);
        assert_eq!(servers[0].name, "acme");
        assert_eq!(next.as_deref(), Some("cursor-2"));
    }

    #[tokio::test]
    async fn test_list_servers_search_and_cursor_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0.1/servers"))
            .and(query_param("search", "weather"))
            .and(query_param("cursor", "abc"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(list_servers_body(vec![], None)),
            )
            .mount(&server)
            .await;

        let request = ListServersRequest {
            search: Some("weather".to_string()),
            cursor: Some("abc".to_string()),
        };
        let (servers, next) = client()
            .list_servers(&registry(&server.uri()), &request)
            .await
            .unwrap();
        assert!(servers.is_empty());
        assert_eq!(next, None);
    }

    #[tokio::test]
    async fn test_get_server_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0.1/servers/acme-id/versions/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(server_details_body(
                "acme",
                &[
                    ("https://acme.example.com/sse", "sse"),
                    ("https://acme.example.com/mcp", "streamable-http"),
                ],
            )))
            .mount(&server)
            .await;

        let details = client()
            .get_server_details(&registry(&server.uri()), "acme-id")
            .await
            .unwrap();
        assert_eq!(details.remote_url, "https://acme.example.com/mcp");
        assert_eq!(details.transport_type, toolgate_mcp::TransportType::StreamableHttp);
    }

    #[tokio::test]
    async fn test_missing_server_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client()
            .get_server_details(&registry(&server.uri()), "ghost")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn test_tenant_headers_injected() {
        let server = MockServer::start().await;
        let host = server.address().ip().to_string();
        Mock::given(method("GET"))
            .and(header("x-tenant-id", "t-1"))
            .and(header("x-api-key", "k-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(list_servers_body(vec![], None)),
            )
            .mount(&server)
            .await;

        let backend = TenantBackend::new(host, "t-1", "k-1");
        let client = RegistryClient::new(Arc::new(backend), Arc::new(NoopCache)).unwrap();
        let (servers, _) = client
            .list_servers(&registry(&server.uri()), &ListServersRequest::default())
            .await
            .unwrap();
        assert!(servers.is_empty());
    }

    #[tokio::test]
    async fn test_5xx_retried_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(list_servers_body(vec![], None)),
            )
            .mount(&server)
            .await;

        let (servers, _) = client()
            .list_servers(&registry(&server.uri()), &ListServersRequest::default())
            .await
            .unwrap();
        assert!(servers.is_empty());
    }

    #[tokio::test]
    async fn test_5xx_exhausted_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client()
            .list_servers(&registry(&server.uri()), &ListServersRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "gateway_error");
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(list_servers_body(vec![], None)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client =
            RegistryClient::new(Arc::new(PassthroughBackend), Arc::new(MemoryCache::new()))
                .unwrap();
        let reg = registry(&server.uri());
        for _ in 0..2 {
            let (servers, _) = client
                .list_servers(&reg, &ListServersRequest::default())
                .await
                .unwrap();
            assert!(servers.is_empty());
        }
    }
}
