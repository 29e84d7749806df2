//! Single-template rendering with side-effect capture.

use crate::context::RenderContext;
use crate::error::{JinjaError, JinjaResult};
use crate::functions::{
    make_config_fn, make_ref_fn, make_var_fn, ConfigCapture, DependencyCapture,
};
use minijinja::value::Value;
use minijinja::{Environment, UndefinedBehavior};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

/// Names resolved by the render context rather than the template itself.
const CONTEXT_NAMES: &[&str] = &["ref", "var", "config", "this", "target"];

/// How unresolved names behave during a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Parse-time pass: unknown names render as empty, `ref()` calls are
    /// recorded but not resolved, and the SQL output is discarded.
    Discovery,

    /// Compile-time pass: every name must resolve, `ref()` must map to a
    /// known relation, and the SQL output is what runs on the warehouse.
    Strict,
}

/// The result of rendering one node's SQL.
#[derive(Debug, Clone, Default)]
pub struct RenderedSql {
    /// Rendered SQL text
    pub sql: String,

    /// Unique ids of every node referenced through `ref()`
    pub dependencies: BTreeSet<String>,

    /// Key-value pairs captured from `config()` calls, later calls winning
    pub config: BTreeMap<String, serde_json::Value>,

    /// Template names that nothing in the context declares
    pub undefined: BTreeSet<String>,
}

/// Render `raw_sql` for the node `node` against `ctx`.
///
/// Each call builds a fresh environment so captures never leak between
/// nodes. Template syntax errors and strict-mode resolution failures both
/// surface as [`JinjaError::Compiler`] tagged with the node id.
pub fn render(
    raw_sql: &str,
    ctx: &RenderContext,
    node: &str,
    mode: RenderMode,
) -> JinjaResult<RenderedSql> {
    let mut env = Environment::new();
    env.set_undefined_behavior(match mode {
        RenderMode::Discovery => UndefinedBehavior::Lenient,
        RenderMode::Strict => UndefinedBehavior::Strict,
    });

    let dependencies: DependencyCapture = Arc::new(Mutex::new(BTreeSet::new()));
    let config: ConfigCapture = Arc::new(Mutex::new(BTreeMap::new()));

    env.add_function(
        "ref",
        make_ref_fn(
            mode,
            ctx.package_name.clone(),
            ctx.refs.clone(),
            dependencies.clone(),
        ),
    );
    env.add_function("var", make_var_fn(mode, ctx.vars.clone()));
    env.add_function("config", make_config_fn(config.clone()));

    let template = env
        .template_from_str(raw_sql)
        .map_err(|e| compiler_error(node, &e))?;

    let undefined: BTreeSet<String> = template
        .undeclared_variables(false)
        .into_iter()
        .filter(|name| !CONTEXT_NAMES.contains(&name.as_str()))
        .collect();
    if mode == RenderMode::Discovery {
        for name in &undefined {
            log::debug!("Undefined name '{}' in {}", name, node);
        }
    }

    let mut scope: BTreeMap<String, Value> = BTreeMap::new();
    if let Some(this) = &ctx.this {
        scope.insert("this".to_string(), Value::from(this.as_str()));
    }
    if let Some(target) = &ctx.target {
        scope.insert("target".to_string(), Value::from(target.as_str()));
    }

    let sql = template
        .render(Value::from_iter(scope))
        .map_err(|e| compiler_error(node, &e))?;

    let dependencies = dependencies
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    let config = config
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();

    Ok(RenderedSql {
        sql,
        dependencies,
        config,
        undefined,
    })
}

fn compiler_error(node: &str, err: &minijinja::Error) -> JinjaError {
    // Include the source chain; minijinja buries strict-mode detail there.
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(&format!(": {}", cause));
        source = cause.source();
    }
    JinjaError::Compiler {
        node: node.to_string(),
        message,
    }
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
