//! Hierarchical names for tensors pulled out of nested model structure.

use std::fmt;

/// Immutable dotted prefix, e.g. `gpt2.block3.attn`.
///
/// ```
/// use lrt_export::NamespaceContext;
///
/// let ctx = NamespaceContext::root().with_name("gpt2").with_name("block3");
/// assert_eq!(ctx.name("weight"), "gpt2.block3.weight");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceContext {
    prefix: Option<String>,
}

impl NamespaceContext {
    /// Context with no prefix: `name(leaf) == leaf`.
    pub fn root() -> Self {
        Self { prefix: None }
    }

    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Qualified key for `leaf` under this context.
    pub fn name(&self, leaf: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}.{}", prefix, leaf),
            None => leaf.to_string(),
        }
    }

    /// Child context whose prefix is `self.name(sub)`.
    pub fn with_name(&self, sub: &str) -> Self {
        Self {
            prefix: Some(self.name(sub)),
        }
    }
}

impl fmt::Display for NamespaceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix.as_deref().unwrap_or(""))
    }
}
