//! Execution layer for SQLMason.
//!
//! Takes a parsed node registry and its dependency graph, strict-renders
//! each node at dispatch time, and executes the compiled SQL through a
//! connection registry with bounded parallelism.

pub mod compile;
pub mod runner;

pub use compile::{compile_node, relation_for, relation_map};
pub use runner::{NodeResult, RunStatus, Runner};
