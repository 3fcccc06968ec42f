//! One-shot name backfill for the sanitizer change.
//!
//! The historical sanitizer folded `-` into `_`; the current one preserves
//! hyphens. This pass recomputes every stored tool name from its
//! untruncated identifier, rewrites the definition, and replaces the old
//! name inside every toolset that references it.

use std::collections::HashMap;

use tracing::info;

use toolgate_urn::sanitize;

use crate::error::CatalogResult;
use crate::queries::Queries;

/// Outcome of a rename pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RenameReport {
    pub tools_renamed: usize,
    pub toolsets_updated: usize,
}

/// Recompute tool names with the current sanitizer and rewrite both the
/// definitions and the toolset references atomically per record.
pub async fn rename_tools(queries: &dyn Queries) -> CatalogResult<RenameReport> {
    let mut report = RenameReport::default();

    // Old name to new name, for the toolset rewrite below.
    let mut renames: HashMap<String, String> = HashMap::new();

    for definition in queries.list_all_tool_definitions().await? {
        let recomputed = sanitize(&definition.untruncated_name);
        if recomputed.as_str() == definition.name {
            continue;
        }

        queries
            .rename_tool_definition(definition.attachment_id, &definition.name, recomputed.as_str())
            .await?;
        info!(
            attachment = %definition.attachment_id,
            old = %definition.name,
            new = %recomputed,
            "Renamed tool definition"
        );
        renames.insert(definition.name, recomputed.into_string());
        report.tools_renamed += 1;
    }

    if renames.is_empty() {
        return Ok(report);
    }

    for toolset in queries.list_toolsets().await? {
        if !toolset.tool_names.iter().any(|n| renames.contains_key(n)) {
            continue;
        }

        let rewritten: Vec<String> = toolset
            .tool_names
            .iter()
            .map(|n| renames.get(n).cloned().unwrap_or_else(|| n.clone()))
            .collect();
        queries
            .update_toolset_tool_names(toolset.id, rewritten)
            .await?;
        report.toolsets_updated += 1;
    }

    info!(
        tools = report.tools_renamed,
        toolsets = report.toolsets_updated,
        "Name backfill complete"
    );
    Ok(report)
}
