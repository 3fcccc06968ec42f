//! Buffered deployment-event trail.
//!
//! The extractor logs to both the service logger and this buffer; the
//! buffer is flushed as one batch insert at task exit so every extraction
//! leaves a human-readable trail keyed by project, deployment, and
//! attachment, even when the task fails.

use std::sync::Mutex;

use tracing::info;
use uuid::Uuid;

use crate::error::CatalogResult;
use crate::queries::Queries;
use crate::types::DeploymentEvent;

/// Append-only event buffer owned by one extraction task.
pub struct EventBuffer {
    project_id: Uuid,
    deployment_id: Uuid,
    attachment_id: Uuid,
    entries: Mutex<Vec<DeploymentEvent>>,
}

impl EventBuffer {
    pub fn new(project_id: Uuid, deployment_id: Uuid, attachment_id: Uuid) -> Self {
        Self {
            project_id,
            deployment_id,
            attachment_id,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Record a line, mirroring it to the service log.
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!(
            project_id = %self.project_id,
            deployment_id = %self.deployment_id,
            attachment_id = %self.attachment_id,
            "{message}"
        );
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(DeploymentEvent {
                project_id: self.project_id,
                deployment_id: self.deployment_id,
                attachment_id: self.attachment_id,
                message,
            });
    }

    /// Flush the trail as one batch insert.
    pub async fn flush(&self, queries: &dyn Queries) -> CatalogResult<()> {
        let entries = std::mem::take(
            &mut *self.entries.lock().unwrap_or_else(|e| e.into_inner()),
        );
        if entries.is_empty() {
            return Ok(());
        }
        queries.insert_deployment_events(entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::MemoryQueries;

    #[tokio::test]
    async fn test_flush_batches_entries() {
        let queries = MemoryQueries::new();
        let buffer = EventBuffer::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        buffer.log("resolving server details");
        buffer.log("connected without authentication");
        buffer.flush(&queries).await.unwrap();

        let events = queries.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "resolving server details");

        // A second flush inserts nothing new.
        buffer.flush(&queries).await.unwrap();
        assert_eq!(queries.events().len(), 2);
    }
}
