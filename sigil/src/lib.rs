//! # sigil
//!
//! A delimiter-based template engine.
//!
//! This is the meta-crate that re-exports the sub-crates for convenient
//! access. Depend on `sigil` to get everything, or on the individual crates
//! for finer-grained control.
//!
//! ```
//! use sigil::prelude::*;
//!
//! let engine = Engine::new().unwrap();
//! engine.add_string_template("greet", "{if name}Hello {name}{else}Hello stranger{endif}!");
//!
//! let ctx = Context::new().with("name", "ana");
//! assert_eq!(engine.render_to_string("greet", &ctx).unwrap(), "Hello ana!");
//! ```

/// Error types, settings, settings loading and logging.
pub use sigil_core as core;

/// The template engine and its passes.
pub use sigil_template as template;

/// Command framework and built-in CLI commands.
#[cfg(feature = "cli")]
pub use sigil_cli as cli;

/// Third-party crates re-exported for user convenience.
pub use serde_json;
pub use tracing;

/// The types most programs need.
pub mod prelude {
    pub use sigil_core::logging::setup_logging;
    pub use sigil_core::settings_loader;
    pub use sigil_core::{CacheSettings, Settings, SigilError, SigilResult, TemplateSettings};
    pub use sigil_template::{
        CacheStore, Context, Engine, FileCacheStore, FileSystemLoader, Filter, MemoryCacheStore,
        Output, OutputSink, Plugin, StringLoader, StringSink, TemplateLoader, Value, WriterSink,
    };
}
