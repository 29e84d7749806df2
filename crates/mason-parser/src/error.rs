//! Error types for mason-parser

use thiserror::Error;

/// Parsing and project-loading errors
#[derive(Error, Debug)]
pub enum ParseError {
    /// Node belongs to a package the run does not know about (P001)
    #[error("[P001] Node '{node}' belongs to unknown package '{package}'")]
    UnknownPackage { package: String, node: String },

    /// Unique id exceeds the identifier length limit (P002)
    #[error("[P002] Node path '{path}' is longer than {limit} characters")]
    PathTooLong { path: String, limit: usize },

    /// File read failure with the offending path (P003)
    #[error("[P003] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// Invalid glob pattern (P004)
    #[error("[P004] Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Shared node/graph error
    #[error(transparent)]
    Core(#[from] mason_core::CoreError),

    /// Template error during the discovery render
    #[error(transparent)]
    Jinja(#[from] mason_jinja::JinjaError),
}

/// Result type alias for ParseError
pub type ParseResult<T> = Result<T, ParseError>;
