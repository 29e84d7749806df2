//! Turning raw file content into graph-ready nodes.

use crate::error::{ParseError, ParseResult};
use mason_core::{
    get_fqn, node_path, yaml_to_json, DependsOn, Macro, Node, ProjectConfig, ResourceType,
    SourceConfig,
};
use mason_jinja::{RenderContext, RenderMode};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Warehouses commonly cap identifier length at 255.
const MAX_UNIQUE_ID_LENGTH: usize = 255;

/// A node definition as read from disk (or synthesized), before parsing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnparsedNode {
    /// Base name (filename without extension, or synthetic test name)
    pub name: String,

    /// Owning package
    pub package_name: String,

    /// Project-relative path
    pub path: String,

    /// Absolute root directory of the owning project
    pub root_path: String,

    /// Raw template text
    pub raw_sql: String,

    /// Definition-level config block (archives carry one; files do not)
    pub config: BTreeMap<String, serde_json::Value>,
}

/// Parse one definition into a [`Node`].
///
/// The definition is only borrowed; the parser never mutates caller-owned
/// input. `raw_sql` is rendered once in discovery mode purely to capture
/// `ref()` dependencies and inline `config()` values; the rendered output is
/// discarded here and recomputed strictly at execution time.
#[allow(clippy::too_many_arguments)]
pub fn parse_node(
    unparsed: &UnparsedNode,
    resource_type: ResourceType,
    root_config: &ProjectConfig,
    package_config: &ProjectConfig,
    all_packages: &BTreeSet<String>,
    tags: BTreeSet<String>,
    fqn_extra: &[String],
) -> ParseResult<Node> {
    let unique_id = node_path(resource_type, &unparsed.package_name, &unparsed.name);

    if !all_packages.contains(&unparsed.package_name) {
        return Err(ParseError::UnknownPackage {
            package: unparsed.package_name.clone(),
            node: unique_id,
        });
    }
    if unique_id.len() > MAX_UNIQUE_ID_LENGTH {
        return Err(ParseError::PathTooLong {
            path: unique_id,
            limit: MAX_UNIQUE_ID_LENGTH,
        });
    }

    let fqn = get_fqn(&unparsed.path, &unparsed.package_name, fqn_extra);
    let mut source_config = SourceConfig::new(root_config, package_config, &fqn);

    let ctx = RenderContext::new(unparsed.package_name.clone())
        .with_vars(project_vars(root_config, package_config));
    let rendered = mason_jinja::render(&unparsed.raw_sql, &ctx, &unique_id, RenderMode::Discovery)?;

    // Definition-level config first, then inline captures on top.
    source_config.update_in_model_config(unparsed.config.clone());
    source_config.update_in_model_config(rendered.config);

    Ok(Node {
        unique_id,
        resource_type,
        package_name: unparsed.package_name.clone(),
        name: unparsed.name.clone(),
        path: unparsed.path.clone(),
        root_path: unparsed.root_path.clone(),
        fqn,
        raw_sql: unparsed.raw_sql.clone(),
        wrapped_sql: None,
        config: source_config.merged(),
        depends_on: DependsOn {
            nodes: rendered.dependencies,
            macros: BTreeSet::new(),
        },
        tags,
        empty: unparsed.raw_sql.trim().is_empty(),
    })
}

/// Parse a batch of SQL definitions into a registry keyed by unique id.
///
/// A duplicate unique id across the batch is a fatal error.
pub fn parse_sql_nodes(
    definitions: &[UnparsedNode],
    resource_type: ResourceType,
    root_config: &ProjectConfig,
    all_projects: &BTreeMap<String, ProjectConfig>,
    tags: BTreeSet<String>,
    fqn_extra: &[String],
) -> ParseResult<BTreeMap<String, Node>> {
    let all_packages: BTreeSet<String> = all_projects.keys().cloned().collect();
    let mut nodes = BTreeMap::new();

    for unparsed in definitions {
        let package_config = all_projects.get(&unparsed.package_name).ok_or_else(|| {
            ParseError::UnknownPackage {
                package: unparsed.package_name.clone(),
                node: unparsed.name.clone(),
            }
        })?;

        let node = parse_node(
            unparsed,
            resource_type,
            root_config,
            package_config,
            &all_packages,
            tags.clone(),
            fqn_extra,
        )?;

        if nodes.contains_key(&node.unique_id) {
            return Err(mason_core::CoreError::DuplicateNode {
                unique_id: node.unique_id,
            }
            .into());
        }
        nodes.insert(node.unique_id.clone(), node);
    }

    Ok(nodes)
}

/// Record which known macros each node calls.
///
/// Template-call syntax is uniform enough that a name-followed-by-paren scan
/// against the registered macro names finds every call site without
/// evaluating macro bodies.
pub fn link_macro_dependencies(
    nodes: &mut BTreeMap<String, Node>,
    macros: &BTreeMap<String, Macro>,
) {
    let by_name: BTreeMap<&str, &str> = macros
        .values()
        .map(|m| (m.name.as_str(), m.unique_id.as_str()))
        .collect();

    for node in nodes.values_mut() {
        for called in called_names(&node.raw_sql) {
            if let Some(unique_id) = by_name.get(called.as_str()) {
                node.depends_on.macros.insert((*unique_id).to_string());
            }
        }
    }
}

/// Names appearing in call position anywhere in a template.
pub(crate) fn called_names(source: &str) -> BTreeSet<String> {
    static CALL_RE: OnceLock<Regex> = OnceLock::new();
    let re = CALL_RE.get_or_init(|| {
        Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap_or_else(|e| {
            unreachable!("call-site regex is valid: {e}")
        })
    });

    re.captures_iter(source)
        .map(|c| c[1].to_string())
        .collect()
}

/// Project vars visible to a node: root vars overlaid by package vars.
fn project_vars(
    root_config: &ProjectConfig,
    package_config: &ProjectConfig,
) -> BTreeMap<String, serde_json::Value> {
    let mut vars: BTreeMap<String, serde_json::Value> = root_config
        .vars
        .iter()
        .map(|(k, v)| (k.clone(), yaml_to_json(v)))
        .collect();
    for (k, v) in &package_config.vars {
        vars.insert(k.clone(), yaml_to_json(v));
    }
    vars
}

#[cfg(test)]
#[path = "parser_test.rs"]
mod tests;
