use super::*;
use mason_core::CoreError;
use serde_json::json;

fn project(name: &str) -> ProjectConfig {
    ProjectConfig {
        name: name.to_string(),
        ..Default::default()
    }
}

fn project_with_models(name: &str, models_yml: &str) -> ProjectConfig {
    ProjectConfig {
        name: name.to_string(),
        models: serde_yaml::from_str(models_yml).unwrap(),
        ..Default::default()
    }
}

fn unparsed(package: &str, name: &str, path: &str, raw_sql: &str) -> UnparsedNode {
    UnparsedNode {
        name: name.to_string(),
        package_name: package.to_string(),
        path: path.to_string(),
        root_path: "/project".to_string(),
        raw_sql: raw_sql.to_string(),
        config: BTreeMap::new(),
    }
}

fn packages(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn ref_calls_become_dependency_edges() {
    let root = project("analytics");
    let node = parse_node(
        &unparsed(
            "analytics",
            "orders",
            "orders.sql",
            "select * from {{ ref('raw_orders') }}",
        ),
        ResourceType::Model,
        &root,
        &root,
        &packages(&["analytics"]),
        BTreeSet::new(),
        &[],
    )
    .unwrap();

    assert_eq!(node.unique_id, "model.analytics.orders");
    assert_eq!(
        node.depends_on.nodes,
        BTreeSet::from(["model.analytics.raw_orders".to_string()])
    );
    assert!(!node.empty);
}

#[test]
fn inline_config_overrides_project_defaults() {
    let root = project_with_models("analytics", "materialized: view");
    let node = parse_node(
        &unparsed(
            "analytics",
            "orders",
            "orders.sql",
            "{{ config(materialized='table') }}select 1",
        ),
        ResourceType::Model,
        &root,
        &root,
        &packages(&["analytics"]),
        BTreeSet::new(),
        &[],
    )
    .unwrap();

    assert_eq!(node.config.get("materialized"), Some(&json!("table")));
}

#[test]
fn definition_config_is_merged_below_inline() {
    let root = project("analytics");
    let mut definition = unparsed(
        "analytics",
        "orders",
        "orders.sql",
        "{{ config(schema='marts') }}select 1",
    );
    definition
        .config
        .insert("schema".to_string(), json!("staging"));
    definition
        .config
        .insert("unique_key".to_string(), json!("id"));

    let node = parse_node(
        &definition,
        ResourceType::Model,
        &root,
        &root,
        &packages(&["analytics"]),
        BTreeSet::new(),
        &[],
    )
    .unwrap();

    assert_eq!(node.config.get("schema"), Some(&json!("marts")));
    assert_eq!(node.config.get("unique_key"), Some(&json!("id")));
}

#[test]
fn fqn_includes_directory_segments() {
    let root = project("analytics");
    let node = parse_node(
        &unparsed("analytics", "orders", "staging/orders.sql", "select 1"),
        ResourceType::Model,
        &root,
        &root,
        &packages(&["analytics"]),
        BTreeSet::new(),
        &[],
    )
    .unwrap();

    assert_eq!(node.fqn, vec!["analytics", "staging", "orders"]);
}

#[test]
fn unknown_package_is_rejected() {
    let root = project("analytics");
    let err = parse_node(
        &unparsed("mystery", "orders", "orders.sql", "select 1"),
        ResourceType::Model,
        &root,
        &root,
        &packages(&["analytics"]),
        BTreeSet::new(),
        &[],
    )
    .unwrap_err();

    match err {
        ParseError::UnknownPackage { package, .. } => assert_eq!(package, "mystery"),
        other => panic!("expected UnknownPackage, got {other}"),
    }
}

#[test]
fn whitespace_only_sql_is_marked_empty() {
    let root = project("analytics");
    let node = parse_node(
        &unparsed("analytics", "blank", "blank.sql", "  \n\t"),
        ResourceType::Model,
        &root,
        &root,
        &packages(&["analytics"]),
        BTreeSet::new(),
        &[],
    )
    .unwrap();
    assert!(node.empty);
}

#[test]
fn oversized_unique_id_is_rejected() {
    let root = project("analytics");
    let long_name = "x".repeat(300);
    let err = parse_node(
        &unparsed("analytics", &long_name, "orders.sql", "select 1"),
        ResourceType::Model,
        &root,
        &root,
        &packages(&["analytics"]),
        BTreeSet::new(),
        &[],
    )
    .unwrap_err();
    assert!(matches!(err, ParseError::PathTooLong { .. }));
}

#[test]
fn parsing_twice_is_deterministic() {
    let root = project("analytics");
    let definition = unparsed(
        "analytics",
        "orders",
        "orders.sql",
        "{{ config(schema='x') }}select * from {{ ref('a') }}, {{ ref('b') }}",
    );
    let all = packages(&["analytics"]);

    let first = parse_node(
        &definition,
        ResourceType::Model,
        &root,
        &root,
        &all,
        BTreeSet::new(),
        &[],
    )
    .unwrap();
    let second = parse_node(
        &definition,
        ResourceType::Model,
        &root,
        &root,
        &all,
        BTreeSet::new(),
        &[],
    )
    .unwrap();

    assert_eq!(first, second);
}

#[test]
fn undefined_template_names_do_not_fail_parsing() {
    let root = project("analytics");
    let node = parse_node(
        &unparsed(
            "analytics",
            "orders",
            "orders.sql",
            "select {{ unknown_thing }} from {{ ref('raw') }}",
        ),
        ResourceType::Model,
        &root,
        &root,
        &packages(&["analytics"]),
        BTreeSet::new(),
        &[],
    )
    .unwrap();
    assert!(node.depends_on.nodes.contains("model.analytics.raw"));
}

#[test]
fn duplicate_unique_ids_are_fatal() {
    let root = project("analytics");
    let mut all_projects = BTreeMap::new();
    all_projects.insert("analytics".to_string(), root.clone());

    let definitions = vec![
        unparsed("analytics", "orders", "orders.sql", "select 1"),
        unparsed("analytics", "orders", "staging/orders.sql", "select 2"),
    ];
    let err = parse_sql_nodes(
        &definitions,
        ResourceType::Model,
        &root,
        &all_projects,
        BTreeSet::new(),
        &[],
    )
    .unwrap_err();

    match err {
        ParseError::Core(CoreError::DuplicateNode { unique_id }) => {
            assert_eq!(unique_id, "model.analytics.orders");
        }
        other => panic!("expected DuplicateNode, got {other}"),
    }
}

#[test]
fn macro_calls_are_linked_to_known_macros() {
    let root = project("analytics");
    let mut all_projects = BTreeMap::new();
    all_projects.insert("analytics".to_string(), root.clone());

    let definitions = vec![unparsed(
        "analytics",
        "orders",
        "orders.sql",
        "select {{ cents_to_dollars('amount') }}, unknown_fn(1) from t",
    )];
    let mut nodes = parse_sql_nodes(
        &definitions,
        ResourceType::Model,
        &root,
        &all_projects,
        BTreeSet::new(),
        &[],
    )
    .unwrap();

    let mut macros = BTreeMap::new();
    macros.insert(
        "macro.analytics.cents_to_dollars".to_string(),
        mason_core::Macro {
            unique_id: "macro.analytics.cents_to_dollars".to_string(),
            name: "cents_to_dollars".to_string(),
            package_name: "analytics".to_string(),
            root_path: String::new(),
            path: "macros/money.sql".to_string(),
            raw_sql: String::new(),
            depends_on_macros: BTreeSet::new(),
        },
    );

    link_macro_dependencies(&mut nodes, &macros);

    let node = &nodes["model.analytics.orders"];
    assert_eq!(
        node.depends_on.macros,
        BTreeSet::from(["macro.analytics.cents_to_dollars".to_string()])
    );
}
