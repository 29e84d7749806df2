//! Compile command implementation

use anyhow::{Context, Result};
use mason_runner::{compile_node, relation_map};
use std::fs;

use crate::cli::{CompileArgs, GlobalArgs};
use crate::commands::common::{load_profile, load_project, target_schema};

/// Execute the compile command
pub async fn execute(args: &CompileArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let profile = load_profile(global, &project.project_root)?;
    let schema = target_schema(&profile);
    let refs = relation_map(&project.nodes, &schema);

    let output_dir = match &args.output_dir {
        Some(dir) => project.project_root.join(dir),
        None => project.project_root.join("target").join("compiled"),
    };

    let mut compiled_count = 0;
    for unique_id in project.graph.topological_order()? {
        let Some(node) = project.nodes.get(&unique_id) else {
            continue;
        };

        let compiled = compile_node(node, &refs, &project.vars, &schema, Some(&global.profile))
            .with_context(|| format!("Failed to compile {}", unique_id))?;

        let out_path = output_dir.join(&node.path);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&out_path, compiled.compiled_sql())
            .with_context(|| format!("Failed to write {}", out_path.display()))?;

        if global.verbose {
            println!("  compiled {} -> {}", unique_id, out_path.display());
        }
        compiled_count += 1;
    }

    println!(
        "Compiled {} nodes to {}",
        compiled_count,
        output_dir.display()
    );
    Ok(())
}
