//! Final strict render: raw templates become runnable SQL.

use mason_core::{Node, ResourceType};
use mason_jinja::{render, JinjaResult, RenderContext, RenderMode};
use std::collections::BTreeMap;

/// Quoted `"schema"."name"` identifier for a relation.
pub fn relation_for(schema: &str, name: &str) -> String {
    format!("\"{}\".\"{}\"", schema, name)
}

/// Resolved relation identifier for every materializable node, keyed by
/// model name. This is the `refs` table strict renders resolve against.
pub fn relation_map(nodes: &BTreeMap<String, Node>, schema: &str) -> BTreeMap<String, String> {
    nodes
        .values()
        .filter(|node| {
            matches!(
                node.resource_type,
                ResourceType::Model | ResourceType::Archive
            )
        })
        .map(|node| (node.name.clone(), relation_for(schema, &node.name)))
        .collect()
}

/// Strict-render one node and return a compiled copy with `wrapped_sql`
/// set. `this` resolves to the relation the node materializes into and
/// `target`, when given, to the active profile name.
pub fn compile_node(
    node: &Node,
    refs: &BTreeMap<String, String>,
    vars: &BTreeMap<String, serde_json::Value>,
    schema: &str,
    target: Option<&str>,
) -> JinjaResult<Node> {
    let mut ctx = RenderContext::new(node.package_name.clone())
        .with_vars(vars.clone())
        .with_refs(refs.clone())
        .with_this(relation_for(schema, &node.name));
    if let Some(target) = target {
        ctx = ctx.with_target(target);
    }

    let rendered = render(&node.raw_sql, &ctx, &node.unique_id, RenderMode::Strict)?;

    let mut compiled = node.clone();
    compiled.wrapped_sql = Some(rendered.sql);
    Ok(compiled)
}

#[cfg(test)]
#[path = "compile_test.rs"]
mod tests;
