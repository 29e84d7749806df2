//! Jinja templating layer for SQLMason.
//!
//! Rendering happens twice per node: a discovery pass at parse time that
//! captures `ref()` targets and `config()` values while tolerating unknown
//! names, and a strict pass at compile time that produces runnable SQL.

pub mod context;
pub mod error;
mod functions;
pub mod macros;
pub mod render;

pub use context::RenderContext;
pub use error::{JinjaError, JinjaResult};
pub use macros::extract_macros;
pub use render::{render, RenderMode, RenderedSql};
