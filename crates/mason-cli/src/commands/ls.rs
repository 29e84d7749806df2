//! List command implementation

use anyhow::Result;
use mason_core::Node;

use crate::cli::{GlobalArgs, LsArgs, LsOutput};
use crate::commands::common::load_project;

/// Execute the ls command
pub async fn execute(args: &LsArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let order = project.graph.topological_order()?;

    match args.output {
        LsOutput::Json => {
            let listed: Vec<&Node> = order
                .iter()
                .filter_map(|unique_id| project.nodes.get(unique_id))
                .collect();
            println!("{}", serde_json::to_string_pretty(&listed)?);
        }
        LsOutput::Table => {
            for unique_id in &order {
                let Some(node) = project.nodes.get(unique_id) else {
                    continue;
                };
                if node.depends_on.nodes.is_empty() {
                    println!("{}", unique_id);
                } else {
                    let deps: Vec<&str> =
                        node.depends_on.nodes.iter().map(String::as_str).collect();
                    println!("{}  (depends on: {})", unique_id, deps.join(", "));
                }
            }
            println!();
            println!("{} nodes", order.len());
        }
    }

    Ok(())
}
