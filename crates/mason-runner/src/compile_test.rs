use super::*;
use mason_core::{node_path, DependsOn, ResourceType};
use mason_jinja::JinjaError;
use std::collections::BTreeSet;

fn node(resource_type: ResourceType, name: &str, raw_sql: &str) -> Node {
    Node {
        unique_id: node_path(resource_type, "analytics", name),
        resource_type,
        package_name: "analytics".to_string(),
        name: name.to_string(),
        path: format!("{}.sql", name),
        root_path: String::new(),
        fqn: vec!["analytics".to_string(), name.to_string()],
        raw_sql: raw_sql.to_string(),
        wrapped_sql: None,
        config: BTreeMap::new(),
        depends_on: DependsOn::default(),
        tags: BTreeSet::new(),
        empty: false,
    }
}

fn registry_of(nodes: Vec<Node>) -> BTreeMap<String, Node> {
    nodes
        .into_iter()
        .map(|n| (n.unique_id.clone(), n))
        .collect()
}

#[test]
fn relation_map_covers_models_and_archives_only() {
    let nodes = registry_of(vec![
        node(ResourceType::Model, "orders", "select 1"),
        node(ResourceType::Archive, "orders_archive", "-- noop"),
        node(ResourceType::Test, "not_null_orders_id", "select count(*)"),
    ]);

    let refs = relation_map(&nodes, "analytics");
    assert_eq!(
        refs.get("orders"),
        Some(&"\"analytics\".\"orders\"".to_string())
    );
    assert_eq!(
        refs.get("orders_archive"),
        Some(&"\"analytics\".\"orders_archive\"".to_string())
    );
    assert!(!refs.contains_key("not_null_orders_id"));
}

#[test]
fn compile_resolves_ref_this_and_target() {
    let orders = node(
        ResourceType::Model,
        "orders",
        "select * from {{ ref('raw_orders') }} -- built by {{ target }} into {{ this }}",
    );
    let nodes = registry_of(vec![
        orders.clone(),
        node(ResourceType::Model, "raw_orders", "select 1"),
    ]);

    let refs = relation_map(&nodes, "analytics");
    let compiled = compile_node(&orders, &refs, &BTreeMap::new(), "analytics", Some("dev")).unwrap();

    assert_eq!(
        compiled.wrapped_sql.as_deref(),
        Some(
            "select * from \"analytics\".\"raw_orders\" -- built by dev into \"analytics\".\"orders\""
        )
    );
    // The input node is untouched.
    assert!(orders.wrapped_sql.is_none());
}

#[test]
fn unresolved_ref_is_a_compiler_error() {
    let orders = node(
        ResourceType::Model,
        "orders",
        "select * from {{ ref('nope') }}",
    );

    let err = compile_node(&orders, &BTreeMap::new(), &BTreeMap::new(), "analytics", None)
        .unwrap_err();
    match err {
        JinjaError::Compiler { node, message } => {
            assert_eq!(node, "model.analytics.orders");
            assert!(message.contains("no resolved relation"), "{message}");
        }
        other => panic!("expected Compiler, got {other}"),
    }
}
