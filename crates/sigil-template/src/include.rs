//! Template inclusion.
//!
//! `{include: name}` is replaced by the named template, composed and
//! processed against the including template's context. Includes and
//! `extends` share one [`CompositionStack`] per render, so a template that
//! (directly or indirectly) pulls itself back in fails with a
//! `CompositionError` naming the cycle instead of recursing forever.

use sigil_core::error::{SigilError, SigilResult};

use crate::lexer::{find_tags, TagMatch, TagSyntax};

/// Returns every `include` tag in `text`, in order.
pub fn find_includes(text: &str, syntax: &TagSyntax) -> Vec<TagMatch> {
    find_tags(&syntax.include, text)
}

/// The chain of templates currently being composed in one render.
#[derive(Debug, Default)]
pub struct CompositionStack {
    names: Vec<String>,
}

impl CompositionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `name`, failing if it is already being composed.
    pub fn enter(&mut self, name: &str) -> SigilResult<()> {
        if self.names.iter().any(|n| n == name) {
            let mut path = self.names.clone();
            path.push(name.to_string());
            return Err(SigilError::CompositionError(format!(
                "Template cycle detected: {}",
                path.join(" -> ")
            )));
        }
        self.names.push(name.to_string());
        Ok(())
    }

    /// Pops the innermost template.
    pub fn leave(&mut self) {
        self.names.pop();
    }

    /// Nesting depth.
    pub fn depth(&self) -> usize {
        self.names.len()
    }
}
