//! The values a template is rendered against.

use std::collections::BTreeMap;

/// Inputs for rendering one node's SQL.
///
/// During discovery only `package_name` and `vars` matter; the compile
/// phase fills in `refs` (resolved relation names keyed by model name),
/// `this`, and `target` once the graph is known.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Package the node belongs to; used for one-argument `ref()` calls
    pub package_name: String,

    /// Project variables exposed through `var()`
    pub vars: BTreeMap<String, serde_json::Value>,

    /// Resolved relation name for each referenced model name
    pub refs: BTreeMap<String, String>,

    /// Qualified relation the node itself materializes into
    pub this: Option<String>,

    /// Name of the active target profile
    pub target: Option<String>,
}

impl RenderContext {
    /// Create a context for nodes in `package_name`.
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            ..Default::default()
        }
    }

    /// Set the project variables.
    pub fn with_vars(mut self, vars: BTreeMap<String, serde_json::Value>) -> Self {
        self.vars = vars;
        self
    }

    /// Set the resolved relations for `ref()` lookups.
    pub fn with_refs(mut self, refs: BTreeMap<String, String>) -> Self {
        self.refs = refs;
        self
    }

    /// Set the relation the node materializes into.
    pub fn with_this(mut self, this: impl Into<String>) -> Self {
        self.this = Some(this.into());
        self
    }

    /// Set the target profile name.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}
