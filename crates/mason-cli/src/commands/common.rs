//! Shared project and profile loading for all commands.

use anyhow::{anyhow, bail, Context, Result};
use mason_adapter::{Adapter, AnsiAdapter, ConnectionRegistry, Credentials};
use mason_core::{yaml_to_json, DependencyGraph, Macro, Node, ProjectConfig, ResourceType};
use mason_parser::{
    link_macro_dependencies, load_and_parse_macros, load_and_parse_sql,
    parse_archives_from_projects,
};
use mason_runner::{NodeResult, RunStatus};
use mason_test::load_and_parse_yaml;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::GlobalArgs;

pub const PROJECT_FILE: &str = "mason_project.yml";
pub const PROFILES_FILE: &str = "profiles.yml";

/// Everything the commands need from a parsed project.
#[derive(Debug)]
pub struct LoadedProject {
    pub config: ProjectConfig,
    pub nodes: BTreeMap<String, Node>,
    pub macros: BTreeMap<String, Macro>,
    pub graph: DependencyGraph,
    pub vars: BTreeMap<String, serde_json::Value>,
    pub project_root: PathBuf,
}

/// Load the project file and parse every node it defines: models, data
/// tests, schema tests, archives, and macros.
pub fn load_project(global: &GlobalArgs) -> Result<LoadedProject> {
    let project_root = std::fs::canonicalize(&global.project_dir)
        .with_context(|| format!("Project directory '{}' not found", global.project_dir))?;
    let project_file = project_root.join(PROJECT_FILE);
    let raw = std::fs::read_to_string(&project_file)
        .with_context(|| format!("Failed to read {}", project_file.display()))?;

    let mut config: ProjectConfig =
        serde_yaml::from_str(&raw).with_context(|| format!("Failed to parse {}", PROJECT_FILE))?;
    if config.name.is_empty() {
        bail!("{} must set a project name", PROJECT_FILE);
    }
    config.project_root = project_root.display().to_string();

    let all_projects = BTreeMap::from([(config.name.clone(), config.clone())]);

    let mut nodes = load_and_parse_sql(&config, &config, &all_projects, ResourceType::Model)?;
    merge_nodes(
        &mut nodes,
        load_and_parse_sql(&config, &config, &all_projects, ResourceType::Test)?,
    )?;
    merge_nodes(
        &mut nodes,
        load_and_parse_yaml(&config, &config, &all_projects)?,
    )?;
    merge_nodes(&mut nodes, parse_archives_from_projects(&config, &all_projects)?)?;

    let macros = load_and_parse_macros(&config)?;
    link_macro_dependencies(&mut nodes, &macros);

    let graph = DependencyGraph::build(&nodes)?;
    log::debug!(
        "Loaded {} nodes and {} macros from {}",
        nodes.len(),
        macros.len(),
        project_root.display()
    );

    let vars = config
        .vars
        .iter()
        .map(|(k, v)| (k.clone(), yaml_to_json(v)))
        .collect();

    Ok(LoadedProject {
        config,
        nodes,
        macros,
        graph,
        vars,
        project_root,
    })
}

fn merge_nodes(into: &mut BTreeMap<String, Node>, from: BTreeMap<String, Node>) -> Result<()> {
    for (unique_id, node) in from {
        if into.insert(unique_id.clone(), node).is_some() {
            bail!("Found two resources with the same unique id: {}", unique_id);
        }
    }
    Ok(())
}

/// One target entry in profiles.yml.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    /// Adapter family
    #[serde(rename = "type", default = "default_adapter_type")]
    pub adapter_type: String,

    /// Target credentials, passed through to the adapter
    #[serde(flatten)]
    pub credentials: Credentials,
}

fn default_adapter_type() -> String {
    "ansi".to_string()
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            adapter_type: default_adapter_type(),
            credentials: Credentials::default(),
        }
    }
}

/// Load the named profile. A missing profiles.yml falls back to neutral
/// defaults so compile-only workflows need no warehouse configuration.
pub fn load_profile(global: &GlobalArgs, project_root: &Path) -> Result<Profile> {
    let path = project_root.join(PROFILES_FILE);
    if !path.exists() {
        return Ok(Profile::default());
    }

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut profiles: BTreeMap<String, Profile> =
        serde_yaml::from_str(&raw).with_context(|| format!("Failed to parse {}", PROFILES_FILE))?;

    profiles.remove(&global.profile).ok_or_else(|| {
        anyhow!(
            "Profile '{}' not found in {}",
            global.profile,
            path.display()
        )
    })
}

/// Build a connection registry for the profile's adapter family.
pub fn build_registry(profile: &Profile) -> Result<Arc<ConnectionRegistry>> {
    let adapter: Arc<dyn Adapter> = match profile.adapter_type.as_str() {
        "ansi" => Arc::new(AnsiAdapter),
        other => bail!("Unknown adapter type '{}'", other),
    };
    Ok(Arc::new(ConnectionRegistry::new(
        adapter,
        profile.credentials.clone(),
    )))
}

/// Schema that compiled relations resolve into.
pub fn target_schema(profile: &Profile) -> String {
    if profile.credentials.schema.is_empty() {
        "public".to_string()
    } else {
        profile.credentials.schema.clone()
    }
}

/// Print per-node outcome lines and the final tally. Errors if any node
/// failed, so the process exits nonzero.
pub fn report_results(results: &[NodeResult]) -> Result<()> {
    let mut success = 0;
    let mut errors = 0;
    let mut skipped = 0;

    for result in results {
        match result.status {
            RunStatus::Success => {
                success += 1;
                println!(
                    "  \u{2713} {} [{:.2}s]",
                    result.unique_id, result.duration_secs
                );
            }
            RunStatus::Error => {
                errors += 1;
                println!(
                    "  \u{2717} {} - {} [{:.2}s]",
                    result.unique_id,
                    result.error.as_deref().unwrap_or("unknown error"),
                    result.duration_secs
                );
            }
            RunStatus::Skipped => {
                skipped += 1;
                println!("  - {} (skipped)", result.unique_id);
            }
        }
    }

    println!();
    println!(
        "Done at {}. {} succeeded, {} errored, {} skipped",
        chrono::Local::now().format("%H:%M:%S"),
        success,
        errors,
        skipped
    );

    if errors > 0 {
        bail!("{} nodes failed", errors);
    }
    Ok(())
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
