//! Persistence seam for the catalog.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use toolgate_registry::Registry;
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};
use crate::types::{DeploymentEvent, ExternalMcpToolDefinition, Toolset};

/// Storage operations the extraction and migration pipelines need.
#[async_trait]
pub trait Queries: Send + Sync {
    /// Look up a configured registry by id.
    async fn get_registry(&self, id: Uuid) -> CatalogResult<Option<Registry>>;

    /// Insert or replace a tool definition; identity is
    /// `(attachment_id, name)`.
    async fn upsert_tool_definition(
        &self,
        definition: ExternalMcpToolDefinition,
    ) -> CatalogResult<()>;

    /// All definitions for one attachment.
    async fn list_tool_definitions(
        &self,
        attachment_id: Uuid,
    ) -> CatalogResult<Vec<ExternalMcpToolDefinition>>;

    /// Every stored tool definition (migration passes scan the lot).
    async fn list_all_tool_definitions(&self) -> CatalogResult<Vec<ExternalMcpToolDefinition>>;

    /// Rename a stored definition, preserving its identity key semantics.
    async fn rename_tool_definition(
        &self,
        attachment_id: Uuid,
        old_name: &str,
        new_name: &str,
    ) -> CatalogResult<()>;

    /// All toolsets.
    async fn list_toolsets(&self) -> CatalogResult<Vec<Toolset>>;

    /// Replace a toolset's tool-name array.
    async fn update_toolset_tool_names(
        &self,
        toolset_id: Uuid,
        tool_names: Vec<String>,
    ) -> CatalogResult<()>;

    /// Batch-insert deployment events.
    async fn insert_deployment_events(&self, events: Vec<DeploymentEvent>) -> CatalogResult<()>;
}

/// In-memory implementation for tests and embedding.
#[derive(Default)]
pub struct MemoryQueries {
    registries: RwLock<HashMap<Uuid, Registry>>,
    /// Keyed by `(attachment_id, name)`.
    definitions: RwLock<HashMap<(Uuid, String), ExternalMcpToolDefinition>>,
    toolsets: RwLock<HashMap<Uuid, Toolset>>,
    events: RwLock<Vec<DeploymentEvent>>,
}

impl MemoryQueries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_registry(&self, registry: Registry) {
        self.registries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(registry.id, registry);
    }

    pub fn add_toolset(&self, toolset: Toolset) {
        self.toolsets
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(toolset.id, toolset);
    }

    /// Recorded deployment events, in insertion order.
    pub fn events(&self) -> Vec<DeploymentEvent> {
        self.events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Queries for MemoryQueries {
    async fn get_registry(&self, id: Uuid) -> CatalogResult<Option<Registry>> {
        Ok(self
            .registries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned())
    }

    async fn upsert_tool_definition(
        &self,
        definition: ExternalMcpToolDefinition,
    ) -> CatalogResult<()> {
        self.definitions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                (definition.attachment_id, definition.name.clone()),
                definition,
            );
        Ok(())
    }

    async fn list_tool_definitions(
        &self,
        attachment_id: Uuid,
    ) -> CatalogResult<Vec<ExternalMcpToolDefinition>> {
        let mut found: Vec<ExternalMcpToolDefinition> = self
            .definitions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|d| d.attachment_id == attachment_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn list_all_tool_definitions(&self) -> CatalogResult<Vec<ExternalMcpToolDefinition>> {
        let mut found: Vec<ExternalMcpToolDefinition> = self
            .definitions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        found.sort_by(|a, b| (a.attachment_id, &a.name).cmp(&(b.attachment_id, &b.name)));
        Ok(found)
    }

    async fn rename_tool_definition(
        &self,
        attachment_id: Uuid,
        old_name: &str,
        new_name: &str,
    ) -> CatalogResult<()> {
        let mut definitions = self.definitions.write().unwrap_or_else(|e| e.into_inner());
        let mut definition = definitions
            .remove(&(attachment_id, old_name.to_string()))
            .ok_or_else(|| {
                CatalogError::storage(format!("no definition {attachment_id}/{old_name}"))
            })?;
        definition.name = new_name.to_string();
        definitions.insert((attachment_id, new_name.to_string()), definition);
        Ok(())
    }

    async fn list_toolsets(&self) -> CatalogResult<Vec<Toolset>> {
        let mut found: Vec<Toolset> = self
            .toolsets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn update_toolset_tool_names(
        &self,
        toolset_id: Uuid,
        tool_names: Vec<String>,
    ) -> CatalogResult<()> {
        let mut toolsets = self.toolsets.write().unwrap_or_else(|e| e.into_inner());
        let toolset = toolsets
            .get_mut(&toolset_id)
            .ok_or_else(|| CatalogError::storage(format!("no toolset {toolset_id}")))?;
        toolset.tool_names = tool_names;
        Ok(())
    }

    async fn insert_deployment_events(&self, events: Vec<DeploymentEvent>) -> CatalogResult<()> {
        self.events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .extend(events);
        Ok(())
    }
}
