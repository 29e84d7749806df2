//! Node parser and project loaders for SQLMason.
//!
//! Parsing is a pure transformation from raw definitions plus project
//! configuration into graph-ready [`mason_core::Node`]s; loading walks the
//! project directories and feeds what it finds through the parser.

pub mod archives;
pub mod error;
pub mod loader;
pub mod parser;

pub use archives::parse_archives_from_projects;
pub use error::{ParseError, ParseResult};
pub use loader::{find_matching, load_and_parse_macros, load_and_parse_sql, FileMatch};
pub use parser::{link_macro_dependencies, parse_node, parse_sql_nodes, UnparsedNode};
