//! mason-core - Core library for SQLMason
//!
//! This crate provides the shared node types, the project/source config
//! override chain, warehouse column metadata, and the dependency graph
//! used across all SQLMason components.

pub mod column;
pub mod config;
pub mod dag;
pub mod error;
pub mod node;

pub use column::Column;
pub use config::{yaml_to_json, ArchiveBlock, ArchiveTable, ProjectConfig, SourceConfig};
pub use dag::DependencyGraph;
pub use error::{CoreError, CoreResult};
pub use node::{
    get_fqn, macro_path, model_path, node_path, pseudo_test_path, test_path, DependsOn, Macro,
    Node, ResourceType,
};
