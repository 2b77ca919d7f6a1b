//! Whole-content plugins.
//!
//! A plugin rewrites the entire rendered document after variable
//! substitution. Plugins run in registration order, once per render, over
//! the top-level document only.

use std::sync::Arc;

use crate::context::Context;

/// A named whole-content transform.
pub trait Plugin: Send + Sync {
    /// Transforms the rendered content.
    fn apply(&self, content: &str, ctx: &Context) -> String;
}

impl<F> Plugin for F
where
    F: Fn(&str, &Context) -> String + Send + Sync,
{
    fn apply(&self, content: &str, ctx: &Context) -> String {
        self(content, ctx)
    }
}

/// An ordered set of named plugins.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<(String, Arc<dyn Plugin>)>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a plugin. Registering an existing name replaces that plugin
    /// and keeps its position.
    pub fn register(&mut self, name: impl Into<String>, plugin: Arc<dyn Plugin>) {
        let name = name.into();
        if let Some(slot) = self.plugins.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = plugin;
        } else {
            self.plugins.push((name, plugin));
        }
    }

    /// Names in pipeline order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Runs every plugin over `content`, in order.
    pub fn apply_all(&self, content: String, ctx: &Context) -> String {
        self.plugins
            .iter()
            .fold(content, |current, (_, plugin)| plugin.apply(&current, ctx))
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
