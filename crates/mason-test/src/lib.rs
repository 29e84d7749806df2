//! Schema test generator for SQLMason.
//!
//! Declarative YAML constraints (`not_null`, `unique`, `accepted_values`,
//! `relationships`) expand into synthetic Test nodes that flow through the
//! regular node parser and dependency graph.

pub mod generator;
pub mod sql;

pub use generator::{load_and_parse_yaml, parse_schema_tests, UnparsedSchemaFile};
