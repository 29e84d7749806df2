//! Run command implementation

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use mason_core::ResourceType;
use mason_runner::Runner;
use std::time::Duration;

use crate::cli::{GlobalArgs, RunArgs};
use crate::commands::common::{build_registry, load_profile, load_project, report_results};

/// Execute the run command
pub async fn execute(args: &RunArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let include = [ResourceType::Model, ResourceType::Archive];

    if args.dry_run {
        for unique_id in project.graph.topological_order()? {
            if let Some(node) = project.nodes.get(&unique_id) {
                if include.contains(&node.resource_type) {
                    println!("{}", unique_id);
                }
            }
        }
        return Ok(());
    }

    let profile = load_profile(global, &project.project_root)?;
    let registry = build_registry(&profile)?;

    let count = project
        .nodes
        .values()
        .filter(|node| include.contains(&node.resource_type))
        .count();
    println!("Running {} nodes with {} threads", count, global.threads);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Executing...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let runner = Runner::new(registry, global.threads)
        .with_vars(project.vars.clone())
        .with_target(global.profile.clone());
    let results = runner.run(&project.nodes, &project.graph, &include).await?;

    spinner.finish_and_clear();
    report_results(&results)
}
