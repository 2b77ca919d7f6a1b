//! Template engine: composition, the text passes and output.
//!
//! The [`Engine`] is the central entry point. It holds the configuration
//! shared by every render (delimiters, filters, plugins, loaders, default
//! data, cache) and is read-only while rendering, so one engine can serve
//! concurrent renders through an `Arc`.
//!
//! A render runs these stages in order:
//!
//! 1. validate the name, merge the call context over the default data and
//!    escape it when auto-escaping is on;
//! 2. return the cached output if there is one;
//! 3. compose the template: protect `noparse` regions, splice in includes,
//!    resolve `extends` and blocks;
//! 4. expand loops, substitute variables, run plugins, resolve conditionals;
//! 5. restore the protected regions, cache the result and deliver it.
//!
//! Everything a render mutates lives in a per-call `RenderState`.

use std::sync::Arc;

use sigil_core::error::{SigilError, SigilResult};
use sigil_core::logging::render_span;
use sigil_core::settings::{CacheSettings, TemplateSettings};
use tracing::{debug, error, warn};

use crate::cache::{cache_key, CacheStore, FileCacheStore, MemoryCacheStore, RenderCache};
use crate::conditionals::process_conditionals;
use crate::context::{Context, Value};
use crate::filters::{Filter, FilterRegistry};
use crate::include::{find_includes, CompositionStack};
use crate::inheritance::{collect_blocks, find_extends, resolve_blocks, strip_blocks, Blocks};
use crate::lexer::{Delimiters, TagSyntax};
use crate::loaders::{FileSystemLoader, LoaderChain, StringLoader, TemplateLoader};
use crate::loops::expand_loops;
use crate::noparse::NoParseTable;
use crate::output::OutputSink;
use crate::plugins::{Plugin, PluginRegistry};
use crate::resolver::Substitution;

/// Where a render's output goes.
#[derive(Clone, Copy)]
pub enum Output<'a> {
    /// Return the output to the caller.
    Return,
    /// Append the output to a sink and return nothing.
    Emit(&'a dyn OutputSink),
}

impl std::fmt::Debug for Output<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Return => f.write_str("Return"),
            Self::Emit(_) => f.write_str("Emit(..)"),
        }
    }
}

/// State owned by a single render call.
#[derive(Debug, Default)]
struct RenderState {
    noparse: NoParseTable,
    composition: CompositionStack,
    block_stack: Vec<String>,
}

/// The template engine.
///
/// # Examples
///
/// ```
/// use sigil_template::context::Context;
/// use sigil_template::engine::Engine;
///
/// let engine = Engine::new().unwrap();
/// engine.add_string_template("hello", "Hello {name|upper}!");
///
/// let ctx = Context::new().with("name", "ana");
/// assert_eq!(engine.render_to_string("hello", &ctx).unwrap(), "Hello ANA!");
/// ```
pub struct Engine {
    syntax: TagSyntax,
    filters: FilterRegistry,
    plugins: PluginRegistry,
    /// Programmatic templates; always first in `loaders`.
    string_loader: Arc<StringLoader>,
    loaders: LoaderChain,
    defaults: Context,
    cache: RenderCache,
    cache_enabled: bool,
    auto_escape: bool,
    clear_unresolved: bool,
}

impl Engine {
    /// Creates an engine with `{`/`}` delimiters, the built-in filters, an
    /// in-memory cache and auto-escaping on.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the tag grammar cannot be compiled.
    pub fn new() -> SigilResult<Self> {
        let string_loader = Arc::new(StringLoader::new());
        let mut loaders = LoaderChain::new();
        loaders.push(Arc::clone(&string_loader) as Arc<dyn TemplateLoader>);

        Ok(Self {
            syntax: TagSyntax::new(Delimiters::default())?,
            filters: FilterRegistry::with_builtins(),
            plugins: PluginRegistry::new(),
            string_loader,
            loaders,
            defaults: Context::new(),
            cache: RenderCache::default(),
            cache_enabled: true,
            auto_escape: true,
            clear_unresolved: false,
        })
    }

    /// Creates an engine from the given settings.
    ///
    /// Installs a filesystem loader over the configured directories and the
    /// configured cache backend (`memory` or `file`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` for invalid delimiters, an unknown cache
    /// backend or a file backend without a location.
    pub fn from_settings(templates: &TemplateSettings, cache: &CacheSettings) -> SigilResult<Self> {
        let mut engine = Self::new()?;
        engine.set_delimiters(&templates.left_delimiter, &templates.right_delimiter)?;
        engine.add_loader(Arc::new(
            FileSystemLoader::new(templates.dirs.clone()).with_extension(templates.extension.clone()),
        ));
        engine.set_auto_escape(templates.auto_escape);
        engine.set_clear_unresolved(templates.clear_unresolved);

        engine.enable_cache(cache.enabled);
        match cache.backend.as_str() {
            "memory" => engine.set_cache_store(Arc::new(MemoryCacheStore::new())),
            "file" => {
                let dir = cache.location.clone().ok_or_else(|| {
                    SigilError::ConfigurationError(
                        "The file cache backend requires a location".to_string(),
                    )
                })?;
                engine.set_cache_store(Arc::new(FileCacheStore::new(dir)));
            }
            other => {
                return Err(SigilError::ConfigurationError(format!(
                    "Unknown cache backend '{other}'"
                )));
            }
        }
        Ok(engine)
    }

    /// Changes the tag delimiters.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if either delimiter is empty.
    pub fn set_delimiters(&mut self, left: &str, right: &str) -> SigilResult<()> {
        self.syntax = TagSyntax::new(Delimiters::new(left, right)?)?;
        Ok(())
    }

    /// The active delimiters.
    pub fn delimiters(&self) -> &Delimiters {
        self.syntax.delimiters()
    }

    /// Registers a filter, replacing any filter with the same name.
    pub fn add_filter(&mut self, filter: impl Filter + 'static) {
        self.filters.register(filter);
    }

    /// Registers a closure as a filter.
    pub fn register_filter_fn<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&Value, &[String]) -> SigilResult<Value> + Send + Sync + 'static,
    {
        self.filters.register_fn(name, func);
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// Appends a plugin to the pipeline, or replaces one of the same name.
    pub fn register_plugin(&mut self, name: impl Into<String>, plugin: impl Plugin + 'static) {
        self.plugins.register(name, Arc::new(plugin));
    }

    /// Turns render caching on or off.
    pub fn enable_cache(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Replaces the cache store.
    pub fn set_cache_store(&mut self, store: Arc<dyn CacheStore>) {
        self.cache = RenderCache::new(store);
    }

    /// Merges `data` into the default context. Later values win.
    pub fn set_data(&mut self, data: &Context) {
        self.defaults.extend_from(data);
    }

    /// Sets one default context value.
    pub fn assign(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.defaults.set(key, value);
    }

    /// Appends a loader; loaders are tried in the order they were added.
    pub fn add_loader(&mut self, loader: Arc<dyn TemplateLoader>) {
        self.loaders.push(loader);
    }

    /// Adds an in-memory template. These shadow every other loader.
    pub fn add_string_template(&self, name: &str, source: &str) {
        self.string_loader.add(name, source);
    }

    /// Sets whether context strings are HTML-escaped before rendering.
    pub fn set_auto_escape(&mut self, enabled: bool) {
        self.auto_escape = enabled;
    }

    /// Sets whether unresolved variable tags render as the empty string.
    pub fn set_clear_unresolved(&mut self, enabled: bool) {
        self.clear_unresolved = enabled;
    }

    /// Renders a template by name and returns the output.
    ///
    /// # Errors
    ///
    /// See [`Engine::render`].
    pub fn render_to_string(&self, name: &str, ctx: &Context) -> SigilResult<String> {
        let rendered = self.render(name, ctx, Output::Return)?;
        Ok(rendered.unwrap_or_default())
    }

    /// Renders a template by name.
    ///
    /// With [`Output::Return`] the output is returned; with
    /// [`Output::Emit`] it is appended to the sink and `None` is returned.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTemplateName` for an empty name or one that escapes
    /// the template directories, `TemplateNotFound`
    /// when a loader cannot resolve the template or one it includes or
    /// extends, and `CompositionError` when includes or extends form a cycle.
    /// Malformed expressions and failing filters never fail the render.
    pub fn render(&self, name: &str, ctx: &Context, output: Output<'_>) -> SigilResult<Option<String>> {
        let span = render_span(name);
        let _enter = span.enter();

        if name.trim().is_empty() {
            error!("Refusing to render a template with an empty name");
            return Err(SigilError::InvalidTemplateName(
                "Template name must not be empty".to_string(),
            ));
        }

        let mut effective = self.defaults.merged(ctx);
        if self.auto_escape {
            effective = effective.escaped();
        }

        let key = if self.cache_enabled {
            cache_key(name, &effective)
                .inspect_err(|e| warn!(error = %e, "Context not cacheable; cache skipped"))
                .ok()
        } else {
            None
        };

        if let Some(hit) = key.as_deref().and_then(|k| self.cache.lookup(k)) {
            return Ok(deliver(hit, output));
        }

        let content = self.render_uncached(name, &effective)?;
        if let Some(key) = &key {
            self.cache.store(key, &content);
        }
        Ok(deliver(content, output))
    }

    fn render_uncached(&self, name: &str, ctx: &Context) -> SigilResult<String> {
        let mut state = RenderState::default();
        let composed = self.compose(name, ctx, &mut state, &Blocks::new())?;
        let processed = self.process(&composed, ctx, true);
        Ok(state.noparse.restore(&processed))
    }

    /// Loads `name` and resolves its includes, `extends` and blocks.
    fn compose(
        &self,
        name: &str,
        ctx: &Context,
        state: &mut RenderState,
        overrides: &Blocks,
    ) -> SigilResult<String> {
        state.composition.enter(name)?;
        let result = self.compose_entered(name, ctx, state, overrides);
        state.composition.leave();
        result
    }

    fn compose_entered(
        &self,
        name: &str,
        ctx: &Context,
        state: &mut RenderState,
        overrides: &Blocks,
    ) -> SigilResult<String> {
        debug!(template = name, depth = state.composition.depth(), "Composing template");
        let source = self.loaders.load(name, ctx)?;
        let source = state.noparse.extract(&source, &self.syntax);
        let text = self.splice_includes(&source, ctx, state)?;

        let Some(extends) = find_extends(&text, &self.syntax) else {
            return Ok(resolve_blocks(&text, overrides, &self.syntax, &mut state.block_stack));
        };

        let mut blocks = overrides.clone();
        collect_blocks(&text, &self.syntax, &mut blocks);
        let base = self.compose(extends.group(1), ctx, state, &blocks)?;

        let rest = strip_blocks(&text, &self.syntax);
        Ok(match find_extends(&rest, &self.syntax) {
            Some(tag) => {
                let mut out = String::with_capacity(rest.len() + base.len());
                out.push_str(&rest[..tag.span.start]);
                out.push_str(&base);
                out.push_str(&rest[tag.span.end..]);
                out
            }
            // The tag sat inside a block definition and was stripped with it.
            None => rest + &base,
        })
    }

    fn splice_includes(
        &self,
        text: &str,
        ctx: &Context,
        state: &mut RenderState,
    ) -> SigilResult<String> {
        let tags = find_includes(text, &self.syntax);
        if tags.is_empty() {
            return Ok(text.to_string());
        }

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for tag in tags {
            out.push_str(&text[cursor..tag.span.start]);
            let included = self.compose(tag.group(1), ctx, state, &Blocks::new())?;
            out.push_str(&self.process(&included, ctx, false));
            cursor = tag.span.end;
        }
        out.push_str(&text[cursor..]);
        Ok(out)
    }

    /// Runs the text passes. Plugins only run over the top-level document.
    fn process(&self, text: &str, ctx: &Context, top_level: bool) -> String {
        let substitution = Substitution {
            syntax: &self.syntax,
            filters: &self.filters,
            clear_unresolved: self.clear_unresolved,
        };
        let render_body = |body: &str, iteration: &Context| {
            let resolved = process_conditionals(body, iteration, &self.syntax);
            substitution.apply(&resolved, iteration)
        };

        let text = expand_loops(text, ctx, &self.syntax, &render_body);
        let mut text = substitution.apply(&text, ctx);
        if top_level {
            text = self.plugins.apply_all(text, ctx);
        }
        process_conditionals(&text, ctx, &self.syntax)
    }
}

fn deliver(content: String, output: Output<'_>) -> Option<String> {
    match output {
        Output::Return => Some(content),
        Output::Emit(sink) => {
            sink.append_output(&content);
            None
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("delimiters", self.syntax.delimiters())
            .field("filters", &self.filters)
            .field("plugins", &self.plugins)
            .field("loaders", &self.loaders)
            .field("cache_enabled", &self.cache_enabled)
            .field("auto_escape", &self.auto_escape)
            .field("clear_unresolved", &self.clear_unresolved)
            .finish_non_exhaustive()
    }
}
