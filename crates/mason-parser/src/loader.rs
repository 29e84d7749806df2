//! File discovery: models, data tests, and macros on disk.

use crate::error::{ParseError, ParseResult};
use crate::parser::{called_names, parse_sql_nodes, UnparsedNode};
use mason_core::{macro_path, pseudo_test_path, Macro, Node, ProjectConfig, ResourceType};
use mason_jinja::extract_macros;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// One file found under a searched project directory.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMatch {
    /// The configured directory the file was found under
    pub searched_path: String,

    /// Path relative to the searched directory
    pub relative_path: String,

    /// Full path on disk
    pub absolute_path: PathBuf,
}

/// Find non-hidden files matching `pattern` under each of `relative_dirs`.
///
/// Editor droppings and hidden files (names starting with `.`, `#`, or `~`)
/// are skipped. Missing directories are not an error; they simply match
/// nothing.
pub fn find_matching(
    root: &Path,
    relative_dirs: &[String],
    pattern: &str,
) -> ParseResult<Vec<FileMatch>> {
    let mut matches = Vec::new();

    for dir in relative_dirs {
        let base = root.join(dir);
        let glob_pattern = base.join("**").join(pattern);
        let glob_pattern = glob_pattern.to_string_lossy().to_string();

        for entry in glob::glob(&glob_pattern)? {
            let absolute_path = match entry {
                Ok(path) => path,
                Err(e) => {
                    log::warn!("Skipping unreadable path: {}", e);
                    continue;
                }
            };
            if is_hidden(&absolute_path) {
                continue;
            }
            let relative_path = absolute_path
                .strip_prefix(&base)
                .unwrap_or(&absolute_path)
                .to_string_lossy()
                .to_string();
            matches.push(FileMatch {
                searched_path: dir.clone(),
                relative_path,
                absolute_path,
            });
        }
    }

    matches.sort_by(|a, b| a.absolute_path.cmp(&b.absolute_path));
    Ok(matches)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') || n.starts_with('#') || n.starts_with('~'))
        .unwrap_or(true)
}

/// Load `*.sql` files for one package and parse them into nodes.
///
/// Models come from the package's source paths; data tests come from its
/// test paths, are tagged `data`, and get a deterministic pseudo-path so
/// their unique ids never collide with a model of the same name.
pub fn load_and_parse_sql(
    root_config: &ProjectConfig,
    package_config: &ProjectConfig,
    all_projects: &BTreeMap<String, ProjectConfig>,
    resource_type: ResourceType,
) -> ParseResult<BTreeMap<String, Node>> {
    let (dirs, tags) = match resource_type {
        ResourceType::Model => (package_config.source_paths(), BTreeSet::new()),
        ResourceType::Test => (
            package_config.test_paths(),
            BTreeSet::from(["data".to_string()]),
        ),
        other => {
            return Err(mason_core::CoreError::Validation {
                message: format!("cannot load '{}' resources from SQL directories", other),
            }
            .into())
        }
    };

    let root = Path::new(&package_config.project_root);
    let mut definitions = Vec::new();

    for file in find_matching(root, &dirs, "*.sql")? {
        let raw_sql = read_file(&file.absolute_path)?;
        let name = file_stem(&file.absolute_path);

        let path = if resource_type == ResourceType::Test {
            pseudo_test_path(&name, &file.relative_path, "data_test")
        } else {
            file.relative_path.clone()
        };

        definitions.push(UnparsedNode {
            name,
            package_name: package_config.name.clone(),
            path,
            root_path: package_config.project_root.clone(),
            raw_sql,
            config: BTreeMap::new(),
        });
    }

    parse_sql_nodes(
        &definitions,
        resource_type,
        root_config,
        all_projects,
        tags,
        &[],
    )
}

/// Load every macro defined under one package's macro paths.
///
/// A macro name defined twice across files is overwritten by the later file,
/// with a warning.
pub fn load_and_parse_macros(
    package_config: &ProjectConfig,
) -> ParseResult<BTreeMap<String, Macro>> {
    let root = Path::new(&package_config.project_root);
    let mut macros: BTreeMap<String, Macro> = BTreeMap::new();

    for file in find_matching(root, &package_config.macro_paths(), "*.sql")? {
        let raw_sql = read_file(&file.absolute_path)?;
        let names = extract_macros(&raw_sql, &file.relative_path)?;
        let called = called_names(&raw_sql);

        for name in &names {
            let depends_on_macros: BTreeSet<String> = names
                .iter()
                .filter(|other| *other != name && called.contains(*other))
                .map(|other| macro_path(&package_config.name, other))
                .collect();

            let unique_id = macro_path(&package_config.name, name);
            let entry = Macro {
                unique_id: unique_id.clone(),
                name: name.clone(),
                package_name: package_config.name.clone(),
                root_path: package_config.project_root.clone(),
                path: file.relative_path.clone(),
                raw_sql: raw_sql.clone(),
                depends_on_macros,
            };

            if let Some(previous) = macros.insert(unique_id, entry) {
                log::warn!(
                    "Macro '{}' redefined in {}; previous definition in {} is discarded",
                    name,
                    file.relative_path,
                    previous.path
                );
            }
        }
    }

    Ok(macros)
}

fn read_file(path: &Path) -> ParseResult<String> {
    std::fs::read_to_string(path).map_err(|e| ParseError::IoWithPath {
        path: path.display().to_string(),
        source: e,
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;
