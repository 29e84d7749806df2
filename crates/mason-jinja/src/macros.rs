//! Macro-file loading: find the macros a `.sql` file defines.

use crate::error::{JinjaError, JinjaResult};
use minijinja::value::{Value, ValueKind};
use minijinja::{Environment, UndefinedBehavior};

/// Evaluate a macro file and return the names of the macros it defines.
///
/// `{% macro %}` blocks become exported callables when the template is
/// evaluated; plain `{% set %}` exports (strings, numbers, lists) are not
/// macros and are skipped. The file's non-macro output is discarded.
pub fn extract_macros(source: &str, path: &str) -> JinjaResult<Vec<String>> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Lenient);

    let template = env.template_from_str(source).map_err(|e| macro_error(path, &e))?;
    let state = template
        .eval_to_state(())
        .map_err(|e| macro_error(path, &e))?;

    let mut names: Vec<String> = state
        .exports()
        .into_iter()
        .filter(|name| {
            state
                .lookup(name)
                .map(|value| is_macro_value(&value))
                .unwrap_or(false)
        })
        .map(|name| name.to_string())
        .collect();
    names.sort();
    Ok(names)
}

/// Macros surface as map-like objects carrying a string `name`, an
/// `arguments` sequence, and a boolean `caller` flag. `{% set %}` exports
/// are plain data without that shape.
fn is_macro_value(value: &Value) -> bool {
    if value.as_object().is_none() {
        return false;
    }
    let attr_kind = |key: &str| value.get_attr(key).map(|v| v.kind()).ok();
    attr_kind("name") == Some(ValueKind::String)
        && attr_kind("arguments") == Some(ValueKind::Seq)
        && attr_kind("caller") == Some(ValueKind::Bool)
}

fn macro_error(path: &str, err: &minijinja::Error) -> JinjaError {
    JinjaError::MacroFile {
        path: path.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
#[path = "macros_test.rs"]
mod tests;
