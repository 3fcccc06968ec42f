//! Pluggable authorization backends.
//!
//! Some registries are multi-tenant and expect tenant headers on every
//! request. A [`Backend`] decides whether it applies to an outgoing request
//! (`matches`) and, when it does, attaches credentials (`authorize`) before
//! dispatch. Backends are orthogonal to transport.

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Request;

use crate::error::{RegistryError, RegistryResult};

/// Authorization hook applied to every outgoing registry request.
pub trait Backend: Send + Sync {
    /// Whether this backend wants to authorize the request.
    fn matches(&self, request: &Request) -> bool;

    /// Attach credentials to the request.
    fn authorize(&self, request: &mut Request) -> RegistryResult<()>;
}

/// Backend for registries that need no credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughBackend;

impl Backend for PassthroughBackend {
    fn matches(&self, _request: &Request) -> bool {
        false
    }

    fn authorize(&self, _request: &mut Request) -> RegistryResult<()> {
        Ok(())
    }
}

/// Backend injecting `X-Tenant-ID` / `X-API-Key` for one registry host.
#[derive(Debug, Clone)]
pub struct TenantBackend {
    host: String,
    tenant_id: String,
    api_key: String,
}

impl TenantBackend {
    pub fn new(
        host: impl Into<String>,
        tenant_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            tenant_id: tenant_id.into(),
            api_key: api_key.into(),
        }
    }
}

impl Backend for TenantBackend {
    fn matches(&self, request: &Request) -> bool {
        request.url().host_str() == Some(self.host.as_str())
    }

    fn authorize(&self, request: &mut Request) -> RegistryResult<()> {
        let headers = request.headers_mut();
        headers.insert(
            HeaderName::from_static("x-tenant-id"),
            HeaderValue::from_str(&self.tenant_id)
                .map_err(|e| RegistryError::unexpected(format!("bad tenant id: {e}")))?,
        );
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| RegistryError::unexpected(format!("bad api key: {e}")))?,
        );
        Ok(())
    }
}
