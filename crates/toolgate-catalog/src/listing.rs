//! Cross-registry server listing.
//!
//! Fans a search out over every configured registry and merges the results.
//! Per-registry failures are logged and tolerated; the merged list is capped
//! so one oversized registry cannot flood the response.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use toolgate_registry::{ListServersRequest, Registry, RegistryClient, ServerSummary};

/// Merged results never exceed this many servers.
pub const MAX_LISTING_RESULTS: usize = 100;

/// One server available for attachment, tagged with its registry.
#[derive(Debug, Clone)]
pub struct AvailableServer {
    pub registry_id: Uuid,
    pub registry_name: String,
    pub summary: ServerSummary,
}

/// List servers across all given registries, first page each.
///
/// Registries that fail to respond are skipped; the merged list preserves
/// registry order and is truncated at [`MAX_LISTING_RESULTS`].
pub async fn list_available_servers(
    client: &Arc<RegistryClient>,
    registries: &[Registry],
    search: Option<&str>,
) -> Vec<AvailableServer> {
    let request = ListServersRequest {
        search: search.map(str::to_string),
        cursor: None,
    };

    let mut merged = Vec::new();
    for registry in registries {
        if merged.len() >= MAX_LISTING_RESULTS {
            break;
        }

        match client.list_servers(registry, &request).await {
            Ok((summaries, _next_cursor)) => {
                for summary in summaries {
                    if merged.len() >= MAX_LISTING_RESULTS {
                        break;
                    }
                    merged.push(AvailableServer {
                        registry_id: registry.id,
                        registry_name: registry.name.clone(),
                        summary,
                    });
                }
            }
            Err(e) => {
                warn!(registry = %registry.name, error = %e, "Skipping registry in listing");
            }
        }
    }

    merged
}
