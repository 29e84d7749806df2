//! Error types for mason-adapter

use thiserror::Error;

/// Adapter and connection-protocol errors
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Transaction protocol violation; a scheduler or adapter bug (A001)
    #[error("[A001] Programming error: {0}")]
    Programming(String),

    /// Adapter is missing a required dialect function (A002)
    #[error("[A002] `{function}` is not implemented for this adapter!")]
    NotImplemented { function: &'static str },

    /// Normalized driver failure; fails the node, not the run (A003)
    #[error("[A003] Query failed on connection \"{connection}\": {message}\nSQL: {sql}")]
    Execution {
        connection: String,
        sql: String,
        message: String,
    },

    /// Connection could not be acquired (A004)
    #[error("[A004] Connection failed: {0}")]
    Connection(String),

    /// Embedded operation marker carries an undecodable payload (A005)
    #[error("[A005] Invalid operation marker: {message}")]
    OperationDecode { message: String },

    /// Shared column/validation error
    #[error(transparent)]
    Core(#[from] mason_core::CoreError),
}

/// Result type alias for AdapterError
pub type AdapterResult<T> = Result<T, AdapterError>;
