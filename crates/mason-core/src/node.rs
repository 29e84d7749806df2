//! Graph node types: every compilable unit in a SQLMason project is a [`Node`].
//!
//! A node's `unique_id` is `{resource_type}.{package}.{name}` and is globally
//! unique within a run. Nodes are created by the parser, mutated only during
//! compilation (config merge, dependency capture, final render), and never
//! mutated during execution.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// Resource kind discriminator for graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// SQL transformation model
    Model,
    /// Data or schema test
    Test,
    /// Callable template fragment
    Macro,
    /// Snapshot-style archive of a source table
    Archive,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Model => write!(f, "model"),
            ResourceType::Test => write!(f, "test"),
            ResourceType::Macro => write!(f, "macro"),
            ResourceType::Archive => write!(f, "archive"),
        }
    }
}

/// Build the unique id for a resource: `{resource_type}.{package}.{name}`.
pub fn node_path(resource_type: ResourceType, package_name: &str, resource_name: &str) -> String {
    format!("{}.{}.{}", resource_type, package_name, resource_name)
}

/// Unique id for a model resource.
pub fn model_path(package_name: &str, resource_name: &str) -> String {
    node_path(ResourceType::Model, package_name, resource_name)
}

/// Unique id for a test resource.
pub fn test_path(package_name: &str, resource_name: &str) -> String {
    node_path(ResourceType::Test, package_name, resource_name)
}

/// Unique id for a macro resource.
pub fn macro_path(package_name: &str, resource_name: &str) -> String {
    node_path(ResourceType::Macro, package_name, resource_name)
}

/// Captured dependency edges for a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependsOn {
    /// Unique ids of nodes this node references
    #[serde(default)]
    pub nodes: BTreeSet<String>,

    /// Unique ids of macros this node calls
    #[serde(default)]
    pub macros: BTreeSet<String>,
}

/// A compilable unit: model, test, or archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Globally unique id (`{resource_type}.{package}.{name}`)
    pub unique_id: String,

    /// Resource kind
    pub resource_type: ResourceType,

    /// Owning package
    pub package_name: String,

    /// Base name (filename without extension, or synthetic test name)
    pub name: String,

    /// Project-relative path of the defining file (pseudo-path for synthetic nodes)
    pub path: String,

    /// Absolute root directory of the owning project
    #[serde(default)]
    pub root_path: String,

    /// Fully-qualified name: package, directory segments, extras, base name
    pub fqn: Vec<String>,

    /// Raw template text as authored
    pub raw_sql: String,

    /// Final compiled SQL; may embed runtime-operation markers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped_sql: Option<String>,

    /// Merged configuration (project defaults overlaid by inline `config()`)
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,

    /// Captured dependency edges
    #[serde(default)]
    pub depends_on: DependsOn,

    /// Free-form tags
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// True iff the trimmed raw SQL has zero length
    pub empty: bool,
}

impl Node {
    /// The SQL that execution should run: the final render when present,
    /// otherwise the raw template text.
    pub fn compiled_sql(&self) -> &str {
        self.wrapped_sql.as_deref().unwrap_or(&self.raw_sql)
    }
}

/// A callable template fragment, extracted once per project load and
/// immutable thereafter. The callable body is re-instantiated from
/// `raw_sql` by the renderer when invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Macro {
    /// Globally unique id (`macro.{package}.{name}`)
    pub unique_id: String,

    /// Macro name as exported by the template module
    pub name: String,

    /// Owning package
    pub package_name: String,

    /// Absolute root directory of the owning project
    #[serde(default)]
    pub root_path: String,

    /// Project-relative path of the defining file
    pub path: String,

    /// Full source of the defining template file
    pub raw_sql: String,

    /// Unique ids of macros this macro calls
    #[serde(default)]
    pub depends_on_macros: BTreeSet<String>,
}

/// Compute a node's fully-qualified name.
///
/// `fqn = [package] + directory segments of path + extra + [basename]`,
/// order preserved. The filename's extension is dropped.
pub fn get_fqn(path: &str, package_name: &str, extra: &[String]) -> Vec<String> {
    let p = Path::new(path);
    let mut fqn = vec![package_name.to_string()];

    if let Some(parent) = p.parent() {
        for segment in parent.iter() {
            let segment = segment.to_string_lossy();
            if !segment.is_empty() && segment != "." {
                fqn.push(segment.to_string());
            }
        }
    }

    fqn.extend(extra.iter().cloned());

    let base = p
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    fqn.push(base);

    fqn
}

/// Deterministic pseudo-path for a synthetic node, derived from the
/// originating file's location: `{dir(source_path)}/{kind}/{name}.sql`.
///
/// Two different source files never collide, and re-declaring the same name
/// under the same source file yields the same path.
pub fn pseudo_test_path(name: &str, source_path: &str, kind: &str) -> String {
    let dir = Path::new(source_path)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut segments: Vec<String> = Vec::new();
    if !dir.is_empty() {
        segments.push(dir);
    }
    segments.push(kind.to_string());
    segments.push(format!("{}.sql", name));
    segments.join("/")
}

#[cfg(test)]
#[path = "node_test.rs"]
mod tests;
