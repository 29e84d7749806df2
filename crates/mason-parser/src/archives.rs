//! Archive blocks from project files become synthetic nodes.

use crate::error::{ParseError, ParseResult};
use crate::parser::{parse_node, UnparsedNode};
use mason_core::{yaml_to_json, Node, ProjectConfig, ResourceType};
use std::collections::{BTreeMap, BTreeSet};

/// Expand every project's `archive:` blocks into Archive nodes.
///
/// An archive node has no authored SQL; its config carries the source and
/// target coordinates the adapter needs, and its body is a no-op comment so
/// the node is non-empty and schedulable.
pub fn parse_archives_from_projects(
    root_config: &ProjectConfig,
    all_projects: &BTreeMap<String, ProjectConfig>,
) -> ParseResult<BTreeMap<String, Node>> {
    let all_packages: BTreeSet<String> = all_projects.keys().cloned().collect();
    let mut nodes = BTreeMap::new();

    for project in all_projects.values() {
        for block in &project.archive {
            for table in &block.tables {
                let mut config: BTreeMap<String, serde_json::Value> = table
                    .options
                    .iter()
                    .map(|(k, v)| (k.clone(), yaml_to_json(v)))
                    .collect();
                config.insert(
                    "source_schema".to_string(),
                    serde_json::Value::String(block.source_schema.clone()),
                );
                config.insert(
                    "target_schema".to_string(),
                    serde_json::Value::String(block.target_schema.clone()),
                );
                config.insert(
                    "source_table".to_string(),
                    serde_json::Value::String(table.source_table.clone()),
                );
                config.insert(
                    "target_table".to_string(),
                    serde_json::Value::String(table.target_table.clone()),
                );

                let unparsed = UnparsedNode {
                    name: table.target_table.clone(),
                    package_name: project.name.clone(),
                    path: format!("archive/{}.sql", table.target_table),
                    root_path: project.project_root.clone(),
                    raw_sql: "-- noop".to_string(),
                    config,
                };

                let node = parse_node(
                    &unparsed,
                    ResourceType::Archive,
                    root_config,
                    project,
                    &all_packages,
                    BTreeSet::new(),
                    &[],
                )?;

                if nodes.contains_key(&node.unique_id) {
                    return Err(ParseError::Core(mason_core::CoreError::DuplicateNode {
                        unique_id: node.unique_id,
                    }));
                }
                nodes.insert(node.unique_id.clone(), node);
            }
        }
    }

    Ok(nodes)
}

#[cfg(test)]
#[path = "archives_test.rs"]
mod tests;
