//! # sigil-core
//!
//! Core types for the sigil template engine: the error taxonomy, settings,
//! settings loading, and tracing-based logging.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Template, cache, and logging configuration
//! - [`settings_loader`] - TOML/JSON settings files and environment overrides
//! - [`logging`] - Tracing subscriber setup and render spans

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{SigilError, SigilResult};
pub use settings::{CacheSettings, Settings, TemplateSettings};
