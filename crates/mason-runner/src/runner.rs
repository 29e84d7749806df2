//! Bounded-parallel execution over dependency levels.

use crate::compile::{compile_node, relation_map};
use mason_adapter::ConnectionRegistry;
use mason_core::{CoreResult, DependencyGraph, Node, ResourceType};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::Semaphore;

/// Terminal state of one node in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Error,
    /// An ancestor errored; the node was never dispatched
    Skipped,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Error => write!(f, "error"),
            RunStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of one node.
#[derive(Debug, Clone)]
pub struct NodeResult {
    pub unique_id: String,
    pub status: RunStatus,
    pub duration_secs: f64,
    pub error: Option<String>,
}

/// Executes a parsed node registry against one connection registry.
pub struct Runner {
    registry: Arc<ConnectionRegistry>,
    threads: usize,
    vars: BTreeMap<String, serde_json::Value>,
    target: Option<String>,
}

impl Runner {
    /// Create a runner with a worker pool of `threads` (minimum one).
    pub fn new(registry: Arc<ConnectionRegistry>, threads: usize) -> Self {
        Self {
            registry,
            threads: threads.max(1),
            vars: BTreeMap::new(),
            target: None,
        }
    }

    /// Set the project variables exposed to strict renders.
    pub fn with_vars(mut self, vars: BTreeMap<String, serde_json::Value>) -> Self {
        self.vars = vars;
        self
    }

    /// Set the active target profile name.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Run every node of the included resource types in dependency order.
    ///
    /// Levels come from the graph; nodes within a level run concurrently
    /// behind a semaphore. A node whose ancestor errored is marked skipped
    /// and never dispatched; siblings are unaffected. Every connection is
    /// torn down when the run finishes, rolling back anything left open.
    pub async fn run(
        &self,
        nodes: &BTreeMap<String, Node>,
        graph: &DependencyGraph,
        include: &[ResourceType],
    ) -> CoreResult<Vec<NodeResult>> {
        let levels = graph.execution_levels()?;
        let schema = self.registry.default_schema().to_string();
        let refs = relation_map(nodes, &schema);

        let semaphore = Arc::new(Semaphore::new(self.threads));
        let failed: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));
        let results: Arc<Mutex<Vec<NodeResult>>> = Arc::new(Mutex::new(Vec::new()));

        log::debug!(
            "Executing {} dependency levels with {} threads",
            levels.len(),
            self.threads
        );

        for level in levels {
            let mut handles = Vec::new();

            for unique_id in level {
                let Some(node) = nodes.get(&unique_id) else {
                    continue;
                };
                if !include.contains(&node.resource_type) {
                    continue;
                }

                let failed_ancestor = graph
                    .dependencies(&unique_id)
                    .iter()
                    .any(|dep| lock(&failed).contains(dep));
                if failed_ancestor {
                    log::warn!("Skipping {}: a dependency failed", unique_id);
                    lock(&failed).insert(unique_id.clone());
                    lock(&results).push(NodeResult {
                        unique_id,
                        status: RunStatus::Skipped,
                        duration_secs: 0.0,
                        error: Some("a dependency failed".to_string()),
                    });
                    continue;
                }

                let node = node.clone();
                let registry = Arc::clone(&self.registry);
                let refs = refs.clone();
                let vars = self.vars.clone();
                let schema = schema.clone();
                let target = self.target.clone();
                let semaphore = Arc::clone(&semaphore);
                let failed = Arc::clone(&failed);
                let results = Arc::clone(&results);

                handles.push(tokio::spawn(async move {
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(_) => return,
                    };

                    let unique_id = node.unique_id.clone();
                    let result = tokio::task::spawn_blocking(move || {
                        run_single_node(&registry, &node, &refs, &vars, &schema, target.as_deref())
                    })
                    .await
                    .unwrap_or_else(|e| NodeResult {
                        unique_id,
                        status: RunStatus::Error,
                        duration_secs: 0.0,
                        error: Some(format!("worker panicked: {}", e)),
                    });

                    if result.status == RunStatus::Error {
                        lock(&failed).insert(result.unique_id.clone());
                    }
                    lock(&results).push(result);
                }));
            }

            // A level must drain completely before the next one dispatches.
            for handle in handles {
                if let Err(e) = handle.await {
                    log::warn!("Task join error: {}", e);
                }
            }
        }

        self.registry.cleanup_connections();

        let results = lock(&results).clone();
        Ok(results)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Compile and execute one node, timing the whole attempt.
fn run_single_node(
    registry: &ConnectionRegistry,
    node: &Node,
    refs: &BTreeMap<String, String>,
    vars: &BTreeMap<String, serde_json::Value>,
    schema: &str,
    target: Option<&str>,
) -> NodeResult {
    let started = Instant::now();
    log::info!("Running {}", node.unique_id);

    let compiled = match compile_node(node, refs, vars, schema, target) {
        Ok(compiled) => compiled,
        Err(e) => {
            return NodeResult {
                unique_id: node.unique_id.clone(),
                status: RunStatus::Error,
                duration_secs: started.elapsed().as_secs_f64(),
                error: Some(e.to_string()),
            }
        }
    };

    let outcome = match node.resource_type {
        ResourceType::Test => evaluate_test(registry, &compiled),
        _ => registry
            .execute_node(&compiled)
            .map(|_status| ())
            .map_err(|e| e.to_string()),
    };

    let duration_secs = started.elapsed().as_secs_f64();
    match outcome {
        Ok(()) => {
            log::info!("Finished {} in {:.2}s", node.unique_id, duration_secs);
            NodeResult {
                unique_id: node.unique_id.clone(),
                status: RunStatus::Success,
                duration_secs,
                error: None,
            }
        }
        Err(message) => {
            log::warn!("{} failed: {}", node.unique_id, message);
            NodeResult {
                unique_id: node.unique_id.clone(),
                status: RunStatus::Error,
                duration_secs,
                error: Some(message),
            }
        }
    }
}

/// Run a test node's query and read the violation count from the first
/// cell. Zero passes; anything else fails the node.
fn evaluate_test(registry: &ConnectionRegistry, node: &Node) -> Result<(), String> {
    let connection = node.config.get("connection").and_then(|v| v.as_str());
    let mut cursor = registry
        .add_query(connection, node.compiled_sql())
        .map_err(|e| e.to_string())?;
    let rows = cursor.fetchall().map_err(|e| e.to_string())?;

    let failures = rows
        .first()
        .and_then(|row| row.first())
        .and_then(|v| v.as_i64())
        .ok_or_else(|| "test query did not return a count".to_string())?;

    if failures == 0 {
        Ok(())
    } else {
        Err(format!("FAIL {}", failures))
    }
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod tests;
