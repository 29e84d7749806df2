use super::*;
use mason_adapter::{
    Adapter, AdapterError, AdapterResult, Credentials, Cursor, DriverHandle,
};
use mason_core::{node_path, DependsOn};
use serde_json::json;
use std::collections::BTreeSet;

type Rows = Vec<Vec<serde_json::Value>>;

/// Everything the fake driver observed.
#[derive(Default)]
struct Ledger {
    /// `(connection name, sql)` in execution order
    executed: Vec<(String, String)>,
    opens: usize,
    rollbacks: usize,
}

/// Adapter whose handles record into a shared ledger and answer canned rows.
struct FakeWarehouse {
    ledger: Arc<Mutex<Ledger>>,
    canned: Vec<(String, Rows)>,
    fail_on: Option<String>,
}

impl FakeWarehouse {
    fn new() -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::default())),
            canned: Vec::new(),
            fail_on: None,
        }
    }

    /// Answer `rows` for any statement containing `needle`.
    fn with_rows(mut self, needle: &str, rows: Rows) -> Self {
        self.canned.push((needle.to_string(), rows));
        self
    }

    /// Fail any statement containing `needle` with a driver error.
    fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    fn registry(self, schema: &str) -> (Arc<ConnectionRegistry>, Arc<Mutex<Ledger>>) {
        let ledger = Arc::clone(&self.ledger);
        let credentials = Credentials {
            schema: schema.to_string(),
            ..Credentials::default()
        };
        (
            Arc::new(ConnectionRegistry::new(Arc::new(self), credentials)),
            ledger,
        )
    }
}

impl Adapter for FakeWarehouse {
    fn type_name(&self) -> &'static str {
        "fake"
    }

    fn open(&self, _credentials: &Credentials, name: &str) -> AdapterResult<Arc<dyn DriverHandle>> {
        self.ledger.lock().unwrap().opens += 1;
        Ok(Arc::new(FakeHandle {
            name: name.to_string(),
            ledger: Arc::clone(&self.ledger),
            canned: self.canned.clone(),
            fail_on: self.fail_on.clone(),
        }))
    }
}

struct FakeHandle {
    name: String,
    ledger: Arc<Mutex<Ledger>>,
    canned: Vec<(String, Rows)>,
    fail_on: Option<String>,
}

impl DriverHandle for FakeHandle {
    fn execute(&self, sql: &str) -> AdapterResult<Box<dyn Cursor>> {
        if let Some(needle) = &self.fail_on {
            if sql.contains(needle.as_str()) {
                return Err(AdapterError::Connection(
                    "simulated driver failure".to_string(),
                ));
            }
        }

        self.ledger
            .lock()
            .unwrap()
            .executed
            .push((self.name.clone(), sql.to_string()));

        let rows = self
            .canned
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default();
        Ok(Box::new(FakeCursor { rows }))
    }

    fn commit(&self) -> AdapterResult<()> {
        Ok(())
    }

    fn rollback(&self) -> AdapterResult<()> {
        self.ledger.lock().unwrap().rollbacks += 1;
        Ok(())
    }

    fn close(&self) -> AdapterResult<()> {
        Ok(())
    }
}

struct FakeCursor {
    rows: Rows,
}

impl Cursor for FakeCursor {
    fn fetchall(&mut self) -> AdapterResult<Rows> {
        Ok(std::mem::take(&mut self.rows))
    }

    fn status(&self) -> String {
        "SELECT".to_string()
    }
}

fn node(resource_type: ResourceType, name: &str, raw_sql: &str, deps: &[&str]) -> Node {
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
        depends_on: DependsOn {
            nodes: deps.iter().map(|d| d.to_string()).collect(),
            macros: BTreeSet::new(),
        },
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

fn result_for<'a>(results: &'a [NodeResult], unique_id: &str) -> &'a NodeResult {
    results
        .iter()
        .find(|r| r.unique_id == unique_id)
        .unwrap_or_else(|| panic!("no result for {}", unique_id))
}

#[tokio::test(flavor = "multi_thread")]
async fn dependencies_execute_before_dependents() {
    let nodes = registry_of(vec![
        node(ResourceType::Model, "raw_orders", "select 1 as id", &[]),
        node(
            ResourceType::Model,
            "orders",
            "select * from {{ ref('raw_orders') }}",
            &["model.analytics.raw_orders"],
        ),
    ]);
    let graph = DependencyGraph::build(&nodes).unwrap();
    let (registry, ledger) = FakeWarehouse::new().registry("analytics");

    let results = Runner::new(registry, 4)
        .run(&nodes, &graph, &[ResourceType::Model])
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status == RunStatus::Success));

    let sqls: Vec<String> = ledger
        .lock()
        .unwrap()
        .executed
        .iter()
        .map(|(_, sql)| sql.clone())
        .collect();
    assert_eq!(
        sqls,
        vec![
            "select 1 as id",
            "select * from \"analytics\".\"raw_orders\"",
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_ancestors_skip_descendants_but_not_siblings() {
    let nodes = registry_of(vec![
        node(ResourceType::Model, "base", "select boom", &[]),
        node(
            ResourceType::Model,
            "middle",
            "select * from {{ ref('base') }}",
            &["model.analytics.base"],
        ),
        node(
            ResourceType::Model,
            "leaf",
            "select * from {{ ref('middle') }}",
            &["model.analytics.middle"],
        ),
        node(ResourceType::Model, "bystander", "select 2", &[]),
    ]);
    let graph = DependencyGraph::build(&nodes).unwrap();
    let (registry, ledger) = FakeWarehouse::new().failing_on("boom").registry("analytics");

    let results = Runner::new(registry, 4)
        .run(&nodes, &graph, &[ResourceType::Model])
        .await
        .unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(
        result_for(&results, "model.analytics.base").status,
        RunStatus::Error
    );
    assert_eq!(
        result_for(&results, "model.analytics.middle").status,
        RunStatus::Skipped
    );
    assert_eq!(
        result_for(&results, "model.analytics.leaf").status,
        RunStatus::Skipped
    );
    assert_eq!(
        result_for(&results, "model.analytics.bystander").status,
        RunStatus::Success
    );

    // Skipped nodes never reach the driver.
    let sqls: Vec<String> = ledger
        .lock()
        .unwrap()
        .executed
        .iter()
        .map(|(_, sql)| sql.clone())
        .collect();
    assert_eq!(sqls, vec!["select 2"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_nodes_pass_at_zero_violations_and_fail_otherwise() {
    let mut clean = node(
        ResourceType::Test,
        "not_null_orders_id",
        "select count(*) from clean_check",
        &["model.analytics.orders"],
    );
    clean.tags.insert("schema".to_string());
    let mut dirty = node(
        ResourceType::Test,
        "unique_orders_id",
        "select count(*) from dirty_check",
        &["model.analytics.orders"],
    );
    dirty.tags.insert("schema".to_string());

    let nodes = registry_of(vec![
        node(ResourceType::Model, "orders", "select 1", &[]),
        clean,
        dirty,
    ]);
    let graph = DependencyGraph::build(&nodes).unwrap();
    let (registry, _ledger) = FakeWarehouse::new()
        .with_rows("clean_check", vec![vec![json!(0)]])
        .with_rows("dirty_check", vec![vec![json!(3)]])
        .registry("analytics");

    let results = Runner::new(registry, 2)
        .run(&nodes, &graph, &[ResourceType::Model, ResourceType::Test])
        .await
        .unwrap();

    assert_eq!(
        result_for(&results, "test.analytics.not_null_orders_id").status,
        RunStatus::Success
    );
    let failed = result_for(&results, "test.analytics.unique_orders_id");
    assert_eq!(failed.status, RunStatus::Error);
    assert_eq!(failed.error.as_deref(), Some("FAIL 3"));
}

#[tokio::test(flavor = "multi_thread")]
async fn a_test_query_without_a_count_errors_the_node() {
    let mut check = node(
        ResourceType::Test,
        "not_null_orders_id",
        "select count(*) from silent_check",
        &[],
    );
    check.tags.insert("schema".to_string());

    let nodes = registry_of(vec![check]);
    let graph = DependencyGraph::build(&nodes).unwrap();
    // No canned rows for the query, so the cursor comes back empty.
    let (registry, _ledger) = FakeWarehouse::new().registry("analytics");

    let results = Runner::new(registry, 1)
        .run(&nodes, &graph, &[ResourceType::Test])
        .await
        .unwrap();

    let result = result_for(&results, "test.analytics.not_null_orders_id");
    assert_eq!(result.status, RunStatus::Error);
    assert_eq!(
        result.error.as_deref(),
        Some("test query did not return a count")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn render_failures_error_the_node_without_touching_the_driver() {
    let nodes = registry_of(vec![node(
        ResourceType::Model,
        "orders",
        "select {{ var('missing') }}",
        &[],
    )]);
    let graph = DependencyGraph::build(&nodes).unwrap();
    let (registry, ledger) = FakeWarehouse::new().registry("analytics");

    let results = Runner::new(registry, 1)
        .run(&nodes, &graph, &[ResourceType::Model])
        .await
        .unwrap();

    let result = result_for(&results, "model.analytics.orders");
    assert_eq!(result.status, RunStatus::Error);
    assert!(
        result.error.as_deref().unwrap_or_default().contains("missing"),
        "{:?}",
        result.error
    );
    assert!(ledger.lock().unwrap().executed.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn excluded_resource_types_are_not_dispatched() {
    let nodes = registry_of(vec![
        node(ResourceType::Model, "orders", "select 1", &[]),
        node(
            ResourceType::Test,
            "not_null_orders_id",
            "select count(*) from x",
            &["model.analytics.orders"],
        ),
    ]);
    let graph = DependencyGraph::build(&nodes).unwrap();
    let (registry, _ledger) = FakeWarehouse::new().registry("analytics");

    let results = Runner::new(registry, 2)
        .run(&nodes, &graph, &[ResourceType::Model])
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].unique_id, "model.analytics.orders");
}

#[tokio::test(flavor = "multi_thread")]
async fn the_master_connection_is_shared_across_nodes() {
    let nodes = registry_of(vec![
        node(ResourceType::Model, "a", "select 1", &[]),
        node(ResourceType::Model, "b", "select 2", &[]),
    ]);
    let graph = DependencyGraph::build(&nodes).unwrap();
    let (registry, ledger) = FakeWarehouse::new().registry("analytics");

    Runner::new(registry, 1)
        .run(&nodes, &graph, &[ResourceType::Model])
        .await
        .unwrap();

    let ledger = ledger.lock().unwrap();
    assert_eq!(ledger.opens, 1);
    assert!(ledger.executed.iter().all(|(name, _)| name == "master"));
}
