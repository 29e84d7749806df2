//! Expanding declarative YAML constraints into executable test nodes.
//!
//! Each generated test selects a violation count; the test passes iff the
//! count is zero. The generated SQL references models through `ref()` so the
//! discovery render wires the test behind the model it validates.

use crate::sql;
use mason_core::{pseudo_test_path, Node, ProjectConfig, ResourceType};
use mason_parser::{find_matching, parse_node, ParseError, ParseResult, UnparsedNode};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// A schema-test YAML file as read from disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnparsedSchemaFile {
    /// Filename without extension
    pub name: String,

    /// Owning package
    pub package_name: String,

    /// Project-relative path
    pub path: String,

    /// Absolute root directory of the owning project
    pub root_path: String,

    /// Raw file content
    pub raw_yml: String,
}

/// Find `*.yml` files under one package's test paths and expand them.
pub fn load_and_parse_yaml(
    root_config: &ProjectConfig,
    package_config: &ProjectConfig,
    all_projects: &BTreeMap<String, ProjectConfig>,
) -> ParseResult<BTreeMap<String, Node>> {
    let root = Path::new(&package_config.project_root);
    let mut files = Vec::new();

    for file in find_matching(root, &package_config.test_paths(), "*.yml")? {
        let raw_yml = std::fs::read_to_string(&file.absolute_path).map_err(|e| {
            ParseError::IoWithPath {
                path: file.absolute_path.display().to_string(),
                source: e,
            }
        })?;
        let name = file
            .absolute_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        files.push(UnparsedSchemaFile {
            name,
            package_name: package_config.name.clone(),
            path: file.relative_path,
            root_path: package_config.project_root.clone(),
            raw_yml,
        });
    }

    parse_schema_tests(&files, root_config, all_projects)
}

/// Expand every `{model: {constraints: {test_type: [config...]}}}` entry
/// into a Test node.
///
/// Re-declaring the same test name (same model, type, and name key) yields
/// the same unique id; the later declaration wins and the collision is
/// logged.
pub fn parse_schema_tests(
    files: &[UnparsedSchemaFile],
    root_config: &ProjectConfig,
    all_projects: &BTreeMap<String, ProjectConfig>,
) -> ParseResult<BTreeMap<String, Node>> {
    let mut nodes: BTreeMap<String, Node> = BTreeMap::new();

    for file in files {
        let parsed: serde_yaml::Value = serde_yaml::from_str(&file.raw_yml)
            .map_err(mason_core::CoreError::from)?;
        let serde_yaml::Value::Mapping(models) = parsed else {
            continue;
        };

        for (model_name, test_spec) in &models {
            let Some(model_name) = model_name.as_str() else {
                continue;
            };
            let Some(constraints) = test_spec.get("constraints") else {
                continue;
            };
            let serde_yaml::Value::Mapping(constraints) = constraints else {
                continue;
            };

            for (test_type, configs) in constraints {
                let Some(test_type) = test_type.as_str() else {
                    continue;
                };
                let serde_yaml::Value::Sequence(configs) = configs else {
                    continue;
                };

                for config in configs {
                    let node = parse_schema_test(
                        file,
                        model_name,
                        config,
                        test_type,
                        root_config,
                        all_projects,
                    )?;
                    let Some(node) = node else {
                        continue;
                    };

                    if let Some(previous) = nodes.insert(node.unique_id.clone(), node) {
                        log::warn!(
                            "Schema test '{}' re-declared; the definition from '{}' is discarded",
                            previous.unique_id,
                            previous.path
                        );
                    }
                }
            }
        }
    }

    Ok(nodes)
}

/// Synthesize one test node, or `None` when the config is malformed.
fn parse_schema_test(
    file: &UnparsedSchemaFile,
    model_name: &str,
    test_config: &serde_yaml::Value,
    test_type: &str,
    root_config: &ProjectConfig,
    all_projects: &BTreeMap<String, ProjectConfig>,
) -> ParseResult<Option<Node>> {
    let (raw_sql, name_key) = match test_type {
        "not_null" => {
            let Some(field) = test_config.as_str() else {
                return Ok(skip_malformed(test_type, model_name));
            };
            (sql::not_null(model_name, field), field.to_string())
        }
        "unique" => {
            let Some(field) = test_config.as_str() else {
                return Ok(skip_malformed(test_type, model_name));
            };
            (sql::unique(model_name, field), field.to_string())
        }
        "accepted_values" => {
            let (Some(field), Some(values)) = (
                test_config.get("field").and_then(|v| v.as_str()),
                test_config.get("values").and_then(|v| v.as_sequence()),
            ) else {
                return Ok(skip_malformed(test_type, model_name));
            };
            (
                sql::accepted_values(model_name, field, values),
                field.to_string(),
            )
        }
        "relationships" => {
            let (Some(child_field), Some(parent_field), Some(parent_model)) = (
                test_config.get("from").and_then(|v| v.as_str()),
                test_config.get("field").and_then(|v| v.as_str()),
                test_config.get("to").and_then(|v| v.as_str()),
            ) else {
                return Ok(skip_malformed(test_type, model_name));
            };
            (
                sql::relationships(model_name, child_field, parent_model, parent_field),
                format!("{}_to_{}_{}", child_field, parent_model, parent_field),
            )
        }
        unknown => {
            return Err(mason_core::CoreError::Validation {
                message: format!("Unknown schema test type '{}'", unknown),
            }
            .into())
        }
    };

    let name = format!("{}_{}_{}", test_type, model_name, name_key);
    let all_packages: BTreeSet<String> = all_projects.keys().cloned().collect();
    let package_config =
        all_projects
            .get(&file.package_name)
            .ok_or_else(|| ParseError::UnknownPackage {
                package: file.package_name.clone(),
                node: name.clone(),
            })?;

    let unparsed = UnparsedNode {
        name: name.clone(),
        package_name: file.package_name.clone(),
        path: pseudo_test_path(&name, &file.path, "schema_test"),
        root_path: file.root_path.clone(),
        raw_sql,
        config: BTreeMap::new(),
    };

    parse_node(
        &unparsed,
        ResourceType::Test,
        root_config,
        package_config,
        &all_packages,
        BTreeSet::from(["schema".to_string()]),
        &[],
    )
    .map(Some)
}

fn skip_malformed(test_type: &str, model_name: &str) -> Option<Node> {
    log::warn!(
        "Skipping malformed '{}' test config on model '{}'",
        test_type,
        model_name
    );
    None
}

#[cfg(test)]
#[path = "generator_test.rs"]
mod tests;
