//! TTL cache for registry metadata.
//!
//! Catalog builds hit the same registries over and over; responses are
//! cached for 24 hours under a composite key of the operation, the
//! fully-qualified request URL, and a digest of the tenant headers. Entries
//! expire by TTL only; there is no invalidation API.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

/// Default entry lifetime.
pub const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Build the composite cache key. Headers are sorted so the digest is
/// independent of iteration order; they capture tenant identity.
pub fn cache_key(prefix: &str, url: &str, headers: &[(String, String)]) -> String {
    let mut sorted: Vec<String> = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}"))
        .collect();
    sorted.sort();

    let digest = Sha256::digest(sorted.join("\n").as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{prefix}|{url}|{hex}")
}

/// Opaque storage for serialized registry responses.
#[async_trait]
pub trait MetadataCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String);
}

/// Single-process in-memory cache.
pub struct MemoryCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, String)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_ttl(CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        let (stored_at, value) = entries.get(key)?;
        if stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(value.clone())
    }

    async fn set(&self, key: &str, value: String) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), (Instant::now(), value));
    }
}

/// A cache that stores nothing, for callers that opt out.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl MetadataCache for NoopCache {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: String) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_cache_key_order_independent() {
        let a = cache_key(
            "list",
            "https://r.example.com/v0.1/servers",
            &headers(&[("x-tenant-id", "t"), ("x-api-key", "k")]),
        );
        let b = cache_key(
            "list",
            "https://r.example.com/v0.1/servers",
            &headers(&[("x-api-key", "k"), ("x-tenant-id", "t")]),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_cache_key_separates_tenants() {
        let url = "https://r.example.com/v0.1/servers";
        let a = cache_key("list", url, &headers(&[("x-tenant-id", "t1")]));
        let b = cache_key("list", url, &headers(&[("x-tenant-id", "t2")]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_cache_key_separates_operations() {
        let url = "https://r.example.com/v0.1/servers/acme/versions/latest";
        assert_ne!(cache_key("list", url, &[]), cache_key("details", url, &[]));
    }

    #[tokio::test]
    async fn test_memory_cache_round_trip() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("k").await, None);
        cache.set("k", "v".to_string()).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_memory_cache_expiry() {
        let cache = MemoryCache::with_ttl(Duration::from_millis(10));
        cache.set("k", "v".to_string()).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k").await, None);
    }
}
