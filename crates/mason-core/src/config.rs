//! Project configuration and the source-config override chain.
//!
//! Loading and validating project files is a concern of the caller; this
//! module only defines the shapes the parser consumes and the three-level
//! config resolution: root-project defaults, package-project defaults, and
//! inline `config(...)` calls captured during rendering. Inline always wins.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `archive:` block from a project file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveBlock {
    /// Schema the archived tables are read from
    pub source_schema: String,

    /// Schema the archive nodes write into
    pub target_schema: String,

    /// Tables to archive
    #[serde(default)]
    pub tables: Vec<ArchiveTable>,
}

/// One table entry inside an archive block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveTable {
    /// Table to read
    pub source_table: String,

    /// Table to write
    pub target_table: String,

    /// Additional per-table options (unique_key, updated_at, ...)
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_yaml::Value>,
}

/// A loaded project definition (root or dependency package).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Package name; the first FQN segment of every node in this project
    pub name: String,

    /// Absolute project root directory
    pub project_root: String,

    /// Project variables exposed to templates through `var()`
    pub vars: BTreeMap<String, serde_yaml::Value>,

    /// Nested model-config defaults tree, walked along each node's FQN
    pub models: serde_yaml::Value,

    /// Archive blocks
    pub archive: Vec<ArchiveBlock>,

    /// Directories searched for model files
    pub source_paths: Vec<String>,

    /// Directories searched for data-test and schema-test files
    pub test_paths: Vec<String>,

    /// Directories searched for macro files
    pub macro_paths: Vec<String>,
}

impl ProjectConfig {
    /// Model directories, defaulting to `models/`.
    pub fn source_paths(&self) -> Vec<String> {
        if self.source_paths.is_empty() {
            vec!["models".to_string()]
        } else {
            self.source_paths.clone()
        }
    }

    /// Test directories, defaulting to `tests/`.
    pub fn test_paths(&self) -> Vec<String> {
        if self.test_paths.is_empty() {
            vec!["tests".to_string()]
        } else {
            self.test_paths.clone()
        }
    }

    /// Macro directories, defaulting to `macros/`.
    pub fn macro_paths(&self) -> Vec<String> {
        if self.macro_paths.is_empty() {
            vec!["macros".to_string()]
        } else {
            self.macro_paths.clone()
        }
    }
}

/// The three-level config override chain for a single node.
///
/// Defaults are collected by walking the root project's `models` tree and
/// then the package project's tree along the node's FQN; scalar entries at
/// each visited level apply to everything beneath it, deeper levels
/// overriding shallower ones. Inline `config()` values sit on top.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceConfig {
    defaults: BTreeMap<String, serde_json::Value>,
    in_model: BTreeMap<String, serde_json::Value>,
}

impl SourceConfig {
    /// Seed the chain from root and package project defaults for `fqn`.
    pub fn new(root: &ProjectConfig, package: &ProjectConfig, fqn: &[String]) -> Self {
        let mut defaults = BTreeMap::new();
        collect_fqn_defaults(&root.models, fqn, &mut defaults);
        collect_fqn_defaults(&package.models, fqn, &mut defaults);
        Self {
            defaults,
            in_model: BTreeMap::new(),
        }
    }

    /// Record inline `config(...)` options. Later calls overwrite earlier
    /// keys for the same node.
    pub fn update_in_model_config(
        &mut self,
        opts: impl IntoIterator<Item = (String, serde_json::Value)>,
    ) {
        for (key, value) in opts {
            self.in_model.insert(key, value);
        }
    }

    /// The merged view: defaults overlaid by inline options (inline wins).
    pub fn merged(&self) -> BTreeMap<String, serde_json::Value> {
        let mut merged = self.defaults.clone();
        for (key, value) in &self.in_model {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// Walk a `models` defaults tree along `fqn`, collecting scalar entries.
///
/// Mapping-valued entries are sub-trees (deeper FQN levels); everything else
/// is a config default applying from that level down.
fn collect_fqn_defaults(
    tree: &serde_yaml::Value,
    fqn: &[String],
    out: &mut BTreeMap<String, serde_json::Value>,
) {
    let mut level = tree;
    let mut segments = fqn.iter();

    loop {
        let serde_yaml::Value::Mapping(mapping) = level else {
            return;
        };

        for (key, value) in mapping {
            if value.is_mapping() {
                continue;
            }
            if let Some(key) = key.as_str() {
                out.insert(key.to_string(), yaml_to_json(value));
            }
        }

        let Some(segment) = segments.next() else {
            return;
        };
        match mapping.get(segment.as_str()) {
            Some(child) => level = child,
            None => return,
        }
    }
}

/// Convert a YAML value into its JSON counterpart.
///
/// Non-string mapping keys are dropped; NaN/Infinity become null.
pub fn yaml_to_json(yaml: &serde_yaml::Value) -> serde_json::Value {
    match yaml {
        serde_yaml::Value::Null => serde_json::Value::Null,
        serde_yaml::Value::Bool(b) => serde_json::Value::Bool(*b),
        serde_yaml::Value::Number(n) => convert_yaml_number(n),
        serde_yaml::Value::String(s) => serde_json::Value::String(s.clone()),
        serde_yaml::Value::Sequence(seq) => {
            serde_json::Value::Array(seq.iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let obj: serde_json::Map<String, serde_json::Value> = map
                .iter()
                .filter_map(|(k, v): (&serde_yaml::Value, &serde_yaml::Value)| {
                    k.as_str().map(|key| (key.to_string(), yaml_to_json(v)))
                })
                .collect();
            serde_json::Value::Object(obj)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

/// Convert a YAML number to a JSON value, handling NaN/Infinity gracefully.
fn convert_yaml_number(n: &serde_yaml::Number) -> serde_json::Value {
    if let Some(i) = n.as_i64() {
        return serde_json::Value::Number(serde_json::Number::from(i));
    }
    if let Some(f) = n.as_f64() {
        return match serde_json::Number::from_f64(f) {
            Some(num) => serde_json::Value::Number(num),
            None => {
                log::warn!(
                    "YAML number {} is NaN or Infinity; converting to JSON null",
                    f
                );
                serde_json::Value::Null
            }
        };
    }
    serde_json::Value::Null
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
