//! Error types for mason-jinja

use thiserror::Error;

/// Template compilation and rendering errors
#[derive(Error, Debug)]
pub enum JinjaError {
    /// Template failed to compile or render (J001)
    #[error("[J001] Compilation error in {node}: {message}")]
    Compiler {
        /// Unique id of the node being rendered
        node: String,
        /// Underlying template error
        message: String,
    },

    /// A macro file failed to evaluate (J002)
    #[error("[J002] Failed to load macro file '{path}': {message}")]
    MacroFile { path: String, message: String },
}

/// Result type alias for JinjaError
pub type JinjaResult<T> = Result<T, JinjaError>;
