//! Validation SQL builders. Each query selects a violation count.

fn ref_call(model: &str) -> String {
    format!("{{{{ref('{}')}}}}", model)
}

/// Count rows where `field` is null.
pub fn not_null(model: &str, field: &str) -> String {
    let relation = ref_call(model);
    format!(
        "with validation as (\n  select {field} as f\n  from {relation}\n)\nselect count(*) from validation where f is null"
    )
}

/// Count duplicate non-null values of `field`.
pub fn unique(model: &str, field: &str) -> String {
    let relation = ref_call(model);
    format!(
        "with validation as (\n  select {field} as f\n  from {relation}\n  where {field} is not null\n),\nvalidation_errors as (\n    select f from validation group by f having count(*) > 1\n)\nselect count(*) from validation_errors"
    )
}

/// Count distinct values of `field` outside the accepted set.
pub fn accepted_values(model: &str, field: &str, values: &[serde_yaml::Value]) -> String {
    let relation = ref_call(model);
    let values_csv = format!("'{}'", scalar_strings(values).join("','"));
    format!(
        "with all_values as (\n  select distinct {field} as f\n  from {relation}\n),\nvalidation_errors as (\n    select f from all_values where f not in ({values_csv})\n)\nselect count(*) from validation_errors"
    )
}

/// Count child rows whose `child_field` is non-null and absent from the
/// parent's `parent_field` population.
pub fn relationships(
    child_model: &str,
    child_field: &str,
    parent_model: &str,
    parent_field: &str,
) -> String {
    let child_ref = ref_call(child_model);
    let parent_ref = ref_call(parent_model);
    format!(
        "with parent as (\n  select {parent_field} as id\n  from {parent_ref}\n), child as (\n  select {child_field} as id\n  from {child_ref}\n)\nselect count(*) from child\nwhere id not in (select id from parent) and id is not null"
    )
}

fn scalar_strings(values: &[serde_yaml::Value]) -> Vec<String> {
    values
        .iter()
        .map(|v| match v {
            serde_yaml::Value::String(s) => s.clone(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            other => serde_yaml::to_string(other)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
        })
        .collect()
}
