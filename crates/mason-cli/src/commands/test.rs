//! Test command implementation

use anyhow::Result;
use mason_core::{Node, ResourceType};
use mason_runner::Runner;
use std::collections::BTreeMap;

use crate::cli::{GlobalArgs, TestArgs};
use crate::commands::common::{build_registry, load_profile, load_project, report_results};

/// Execute the test command
pub async fn execute(args: &TestArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let profile = load_profile(global, &project.project_root)?;
    let registry = build_registry(&profile)?;

    // With no flags both kinds run.
    let run_schema = args.schema || !args.data;
    let run_data = args.data || !args.schema;

    let nodes: BTreeMap<String, Node> = project
        .nodes
        .iter()
        .filter(|(_, node)| match node.resource_type {
            ResourceType::Test => {
                (run_schema && node.tags.contains("schema"))
                    || (run_data && node.tags.contains("data"))
            }
            _ => true,
        })
        .map(|(unique_id, node)| (unique_id.clone(), node.clone()))
        .collect();

    let test_count = nodes
        .values()
        .filter(|node| node.resource_type == ResourceType::Test)
        .count();
    if test_count == 0 {
        println!("No tests to run");
        return Ok(());
    }
    println!("Running {} tests with {} threads", test_count, global.threads);

    let runner = Runner::new(registry, global.threads)
        .with_vars(project.vars.clone())
        .with_target(global.profile.clone());
    let results = runner
        .run(&nodes, &project.graph, &[ResourceType::Test])
        .await?;

    report_results(&results)
}
