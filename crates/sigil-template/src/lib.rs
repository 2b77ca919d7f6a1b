//! # sigil-template
//!
//! Delimiter-based template engine for sigil. Templates are plain text with
//! tags between a configurable delimiter pair (`{` and `}` by default):
//!
//! - `{user.name|trim|upper}` - variable with a filter chain
//! - `{if age > 17}...{elseif ...}...{else}...{endif}` - conditionals
//! - `{row in rows}...{end rows}` and `{rows}...{/rows}` - loops
//! - `{extends: base}`, `{block name}...{endblock}`, `{include: partial}`
//! - `{noparse}...{/noparse}` - literal regions
//!
//! The [`Engine`] ties the passes together; each pass lives in its own
//! module and can be used on its own.

pub mod cache;
pub mod conditionals;
pub mod context;
pub mod engine;
pub mod expression;
pub mod filters;
pub mod include;
pub mod inheritance;
pub mod lexer;
pub mod loaders;
pub mod loops;
pub mod noparse;
pub mod output;
pub mod plugins;
pub mod resolver;

pub use cache::{CacheStore, FileCacheStore, MemoryCacheStore};
pub use context::{Context, Value};
pub use engine::{Engine, Output};
pub use filters::{Filter, FilterRegistry};
pub use loaders::{FileSystemLoader, LoaderChain, StringLoader, TemplateLoader};
pub use output::{OutputSink, StringSink, WriterSink};
pub use plugins::{Plugin, PluginRegistry};
