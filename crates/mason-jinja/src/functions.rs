//! Template functions: ref(), var(), and config().
//!
//! All three are side-effecting in the template-language sense; here each
//! one writes into an `Arc<Mutex<..>>` capture owned by the render call, so
//! a render returns its captures instead of mutating shared parser state.

use crate::render::RenderMode;
use minijinja::value::{Kwargs, Rest, Value};
use minijinja::Error;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

/// Captured `ref()` targets (node unique ids)
pub(crate) type DependencyCapture = Arc<Mutex<BTreeSet<String>>>;

/// Captured config values from config() calls
pub(crate) type ConfigCapture = Arc<Mutex<BTreeMap<String, serde_json::Value>>>;

/// Create the ref() function.
///
/// Usage in templates:
/// ```jinja
/// SELECT * FROM {{ ref('orders') }}
/// SELECT * FROM {{ ref('analytics', 'orders') }}
/// ```
///
/// The referenced model's unique id is always recorded into `capture`. In
/// discovery mode the call renders as the bare model name (the output is
/// discarded); in strict mode it must resolve through `refs` or the render
/// fails.
pub(crate) fn make_ref_fn(
    mode: RenderMode,
    package_name: String,
    refs: BTreeMap<String, String>,
    capture: DependencyCapture,
) -> impl Fn(Rest<String>) -> Result<Value, Error> + Send + Sync + 'static {
    move |args: Rest<String>| {
        let (package, name) = match args.as_slice() {
            [name] => (package_name.as_str(), name.as_str()),
            [package, name] => (package.as_str(), name.as_str()),
            _ => {
                return Err(Error::new(
                    minijinja::ErrorKind::InvalidOperation,
                    format!("ref() takes one or two arguments, got {}", args.len()),
                ))
            }
        };

        let unique_id = mason_core::model_path(package, name);
        capture
            .lock()
            .map_err(|e| {
                Error::new(
                    minijinja::ErrorKind::InvalidOperation,
                    format!("dependency mutex poisoned: {e}"),
                )
            })?
            .insert(unique_id);

        match mode {
            RenderMode::Discovery => Ok(Value::from(name)),
            RenderMode::Strict => match refs.get(name) {
                Some(relation) => Ok(Value::from(relation.as_str())),
                None => Err(Error::new(
                    minijinja::ErrorKind::UndefinedError,
                    format!("Model '{}' has no resolved relation", name),
                )),
            },
        }
    }
}

/// Create the var() function that retrieves project variables.
///
/// Usage in templates:
/// ```jinja
/// {{ var('start_date') }}
/// {{ var('missing', 'default_value') }}
/// ```
///
/// During discovery an unknown variable without a default renders as
/// undefined so that parsing can proceed; in strict mode it is an error.
pub(crate) fn make_var_fn(
    mode: RenderMode,
    vars: BTreeMap<String, serde_json::Value>,
) -> impl Fn(&str, Option<Value>) -> Result<Value, Error> + Send + Sync + 'static {
    move |name: &str, default: Option<Value>| {
        if let Some(value) = vars.get(name) {
            return Ok(json_to_minijinja_value(value));
        }
        if let Some(default_val) = default {
            return Ok(default_val);
        }
        match mode {
            RenderMode::Discovery => {
                log::debug!("Variable '{}' is not defined; treating as undefined", name);
                Ok(Value::UNDEFINED)
            }
            RenderMode::Strict => Err(Error::new(
                minijinja::ErrorKind::UndefinedError,
                format!("Variable '{}' is not defined and no default provided", name),
            )),
        }
    }
}

/// Create the config() function that captures model configuration.
///
/// Usage in templates:
/// ```jinja
/// {{ config(materialized='table', schema='staging') }}
/// ```
pub(crate) fn make_config_fn(
    capture: ConfigCapture,
) -> impl Fn(Kwargs) -> Result<String, Error> + Send + Sync + 'static {
    move |kwargs: Kwargs| {
        let mut captured = capture.lock().map_err(|e| {
            Error::new(
                minijinja::ErrorKind::InvalidOperation,
                format!("config mutex poisoned: {e}"),
            )
        })?;

        for key in kwargs.args() {
            let value = kwargs.get::<Value>(key).map_err(|e| {
                Error::new(
                    minijinja::ErrorKind::InvalidOperation,
                    format!("failed to get config kwarg '{}': {}", key, e),
                )
            })?;
            captured.insert(key.to_string(), minijinja_value_to_json(&value));
        }

        // config() renders as nothing
        Ok(String::new())
    }
}

/// Convert serde_json::Value to minijinja::Value
pub(crate) fn json_to_minijinja_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::from(()),
        serde_json::Value::Bool(b) => Value::from(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(f) = n.as_f64() {
                Value::from(f)
            } else {
                Value::from(n.to_string())
            }
        }
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Array(arr) => {
            let values: Vec<Value> = arr.iter().map(json_to_minijinja_value).collect();
            Value::from(values)
        }
        serde_json::Value::Object(obj) => {
            let map: BTreeMap<String, Value> = obj
                .iter()
                .map(|(k, v)| (k.clone(), json_to_minijinja_value(v)))
                .collect();
            Value::from_iter(map)
        }
    }
}

/// Convert a minijinja Value to a serde_json::Value.
///
/// This is the inverse of [`json_to_minijinja_value`] and is used to store
/// captured config() values.
pub(crate) fn minijinja_value_to_json(val: &Value) -> serde_json::Value {
    use minijinja::value::ValueKind;
    match val.kind() {
        ValueKind::Undefined | ValueKind::None => serde_json::Value::Null,
        ValueKind::Bool => serde_json::Value::Bool(val.is_true()),
        ValueKind::Number => {
            let owned = val.clone();
            if let Ok(i) = i64::try_from(owned.clone()) {
                serde_json::Value::Number(i.into())
            } else if let Ok(f) = f64::try_from(owned) {
                serde_json::Number::from_f64(f)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            } else {
                serde_json::Value::Null
            }
        }
        ValueKind::String => {
            serde_json::Value::String(val.as_str().unwrap_or_default().to_string())
        }
        ValueKind::Seq => {
            let items: Vec<serde_json::Value> = val
                .try_iter()
                .map(|iter| iter.map(|v| minijinja_value_to_json(&v)).collect())
                .unwrap_or_default();
            serde_json::Value::Array(items)
        }
        ValueKind::Map => build_json_map(val),
        _ => serde_json::Value::String(val.to_string()),
    }
}

/// Convert a minijinja map value to a JSON object.
fn build_json_map(val: &Value) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    if let Ok(keys) = val.try_iter() {
        for key in keys {
            let key_str = key.as_str().unwrap_or_default().to_string();
            if let Ok(v) = val.get_item(&key) {
                map.insert(key_str, minijinja_value_to_json(&v));
            }
        }
    }
    serde_json::Value::Object(map)
}
