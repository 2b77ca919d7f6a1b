//! Template loaders.
//!
//! Template loaders are responsible for finding and reading template source
//! by name. The [`TemplateLoader`] trait defines the interface, with built-in
//! implementations for filesystem and string-based loading, and a
//! [`LoaderChain`] that tries several loaders in order.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use sigil_core::error::{SigilError, SigilResult};
use tracing::debug;

use crate::context::Context;

/// Loads template source text by name.
///
/// The render context is passed along so that loaders can select sources
/// per request (locale, theme); the built-in loaders ignore it.
pub trait TemplateLoader: Send + Sync {
    /// Loads the template source with the given name.
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` if the template cannot be found and
    /// `InvalidTemplateName` if the name can never refer to a template.
    fn load(&self, name: &str, ctx: &Context) -> SigilResult<String>;
}

/// Loads templates from one or more directories on the filesystem.
///
/// Searches each configured directory in order and returns the first match.
/// Names without an extension get the configured default extension.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    dirs: Vec<PathBuf>,
    extension: Option<String>,
}

impl FileSystemLoader {
    /// Creates a loader over `dirs` that appends `.html` to bare names.
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            extension: Some("html".to_string()),
        }
    }

    /// Sets the default extension (without the dot). `None` disables it.
    #[must_use]
    pub fn with_extension(mut self, extension: Option<String>) -> Self {
        self.extension = extension
            .map(|ext| ext.trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty());
        self
    }

    /// The file name a template name maps to.
    fn file_name(&self, name: &str) -> PathBuf {
        let path = PathBuf::from(name);
        match &self.extension {
            Some(ext) if path.extension().is_none() => path.with_extension(ext),
            _ => path,
        }
    }
}

/// Only plain relative names may reach the filesystem.
fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl TemplateLoader for FileSystemLoader {
    fn load(&self, name: &str, _ctx: &Context) -> SigilResult<String> {
        let file = self.file_name(name);
        if !is_contained(&file) {
            return Err(SigilError::InvalidTemplateName(format!(
                "Template '{name}' escapes the template directories"
            )));
        }

        for dir in &self.dirs {
            let path = dir.join(&file);
            debug!(template = name, path = %path.display(), "Trying template path");
            if path.is_file() {
                return std::fs::read_to_string(&path).map_err(|e| {
                    SigilError::TemplateNotFound(format!(
                        "Error reading template '{}': {e}",
                        path.display()
                    ))
                });
            }
        }

        Err(SigilError::TemplateNotFound(format!(
            "Template '{name}' not found in directories: {:?}",
            self.dirs
        )))
    }
}

/// Loads templates from an in-memory map of name to source strings.
///
/// Useful for tests and for templates built programmatically.
#[derive(Debug, Default)]
pub struct StringLoader {
    templates: RwLock<HashMap<String, String>>,
}

impl StringLoader {
    /// Creates a new empty `StringLoader`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `StringLoader` from a map of template names to sources.
    pub fn from_map(templates: HashMap<String, String>) -> Self {
        Self {
            templates: RwLock::new(templates),
        }
    }

    /// Adds or replaces a template.
    pub fn add(&self, name: impl Into<String>, source: impl Into<String>) {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), source.into());
    }
}

impl TemplateLoader for StringLoader {
    fn load(&self, name: &str, _ctx: &Context) -> SigilResult<String> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| {
                SigilError::TemplateNotFound(format!("Template '{name}' not found in StringLoader"))
            })
    }
}

/// Tries each loader in turn.
///
/// `TemplateNotFound` moves on to the next loader; any other error is
/// returned as is.
#[derive(Clone, Default)]
pub struct LoaderChain {
    loaders: Vec<Arc<dyn TemplateLoader>>,
}

impl LoaderChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a loader to the end of the chain.
    pub fn push(&mut self, loader: Arc<dyn TemplateLoader>) {
        self.loaders.push(loader);
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

impl TemplateLoader for LoaderChain {
    fn load(&self, name: &str, ctx: &Context) -> SigilResult<String> {
        for loader in &self.loaders {
            match loader.load(name, ctx) {
                Err(SigilError::TemplateNotFound(reason)) => {
                    debug!(template = name, %reason, "Loader miss");
                }
                other => return other,
            }
        }
        Err(SigilError::TemplateNotFound(format!(
            "Template '{name}' not found by any loader"
        )))
    }
}

impl std::fmt::Debug for LoaderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderChain")
            .field("loaders", &self.loaders.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(loader: &dyn TemplateLoader, name: &str) -> SigilResult<String> {
        loader.load(name, &Context::new())
    }

    #[test]
    fn test_string_loader_basic() {
        let loader = StringLoader::new();
        loader.add("hello", "Hello {name}!");
        assert_eq!(load(&loader, "hello").unwrap(), "Hello {name}!");
    }

    #[test]
    fn test_string_loader_not_found() {
        let loader = StringLoader::new();
        assert!(matches!(
            load(&loader, "missing"),
            Err(SigilError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_string_loader_from_map_and_overwrite() {
        let loader = StringLoader::from_map(HashMap::from([(
            "a".to_string(),
            "content A".to_string(),
        )]));
        assert_eq!(load(&loader, "a").unwrap(), "content A");
        loader.add("a", "version 2");
        assert_eq!(load(&loader, "a").unwrap(), "version 2");
    }

    #[test]
    fn test_filesystem_loader_not_found() {
        let loader = FileSystemLoader::new(vec![PathBuf::from("/nonexistent/path")]);
        assert!(matches!(
            load(&loader, "missing"),
            Err(SigilError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_filesystem_loader_appends_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("partials")).unwrap();
        std::fs::write(dir.path().join("partials/nav.html"), "<nav/>").unwrap();
        std::fs::write(dir.path().join("plain.txt"), "text").unwrap();

        let loader = FileSystemLoader::new(vec![dir.path().to_path_buf()]);
        assert_eq!(load(&loader, "partials/nav").unwrap(), "<nav/>");
        assert_eq!(load(&loader, "partials/nav.html").unwrap(), "<nav/>");
        assert_eq!(load(&loader, "plain.txt").unwrap(), "text");
    }

    #[test]
    fn test_filesystem_loader_custom_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.tpl"), "tpl").unwrap();
        std::fs::write(dir.path().join("bare"), "no ext").unwrap();

        let loader = FileSystemLoader::new(vec![dir.path().to_path_buf()])
            .with_extension(Some(".tpl".to_string()));
        assert_eq!(load(&loader, "page").unwrap(), "tpl");

        let loader = FileSystemLoader::new(vec![dir.path().to_path_buf()]).with_extension(None);
        assert_eq!(load(&loader, "bare").unwrap(), "no ext");
    }

    #[test]
    fn test_filesystem_loader_search_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(first.path().join("a.html"), "first").unwrap();
        std::fs::write(second.path().join("a.html"), "second").unwrap();
        std::fs::write(second.path().join("b.html"), "only second").unwrap();

        let loader = FileSystemLoader::new(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        assert_eq!(load(&loader, "a").unwrap(), "first");
        assert_eq!(load(&loader, "b").unwrap(), "only second");
    }

    #[test]
    fn test_filesystem_loader_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("templates");
        std::fs::create_dir_all(&inner).unwrap();
        std::fs::write(dir.path().join("secret.html"), "secret").unwrap();

        let loader = FileSystemLoader::new(vec![inner]);
        for name in ["../secret", "/etc/passwd", "nested/../../secret"] {
            assert!(matches!(
                load(&loader, name),
                Err(SigilError::InvalidTemplateName(_))
            ));
        }
    }

    #[test]
    fn test_loader_chain_falls_through() {
        let a = StringLoader::new();
        a.add("one", "from a");
        let b = StringLoader::new();
        b.add("one", "from b");
        b.add("two", "from b");

        let mut chain = LoaderChain::new();
        chain.push(Arc::new(a));
        chain.push(Arc::new(b));
        assert_eq!(chain.len(), 2);
        assert_eq!(load(&chain, "one").unwrap(), "from a");
        assert_eq!(load(&chain, "two").unwrap(), "from b");
        assert!(matches!(
            load(&chain, "three"),
            Err(SigilError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_empty_chain_is_not_found() {
        assert!(matches!(
            load(&LoaderChain::new(), "x"),
            Err(SigilError::TemplateNotFound(_))
        ));
    }
}
