//! Error types for mason-core

use thiserror::Error;

/// Core error type for SQLMason
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Node definition failed validation
    #[error("[E001] Validation failed: {message}")]
    Validation { message: String },

    /// E002: Two parsed nodes produced the same unique id
    #[error("[E002] Duplicate node id: {unique_id}")]
    DuplicateNode { unique_id: String },

    /// E003: Circular dependency detected
    #[error("[E003] Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    /// E004: A node references a node id that does not exist
    #[error("[E004] Node '{node}' depends on '{target}', which was not found")]
    UnknownReference { node: String, target: String },

    /// E005: Node id not present in the registry
    #[error("[E005] Node not found: {unique_id}")]
    NodeNotFound { unique_id: String },

    /// E006: Column metadata cannot support the requested operation
    #[error("[E006] Invalid column type for '{column}': {message}")]
    InvalidColumnType { column: String, message: String },

    /// E007: IO error
    #[error("[E007] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// E008: YAML parse error
    #[error("[E008] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
