//! # sigil-cli
//!
//! Command-line interface for the sigil template engine.
//!
//! This crate provides:
//!
//! - **Command framework** - [`ManagementCommand`] and [`CommandRegistry`]
//! - **Built-in commands** - `render`, `check` and `clearcache`
//!
//! ## Quick Start
//!
//! ```rust
//! use sigil_cli::command::CommandRegistry;
//! use sigil_cli::commands::register_builtin_commands;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry);
//!
//! let names = registry.list_commands();
//! assert_eq!(names, vec!["check", "clearcache", "render"]);
//! ```

pub mod command;
pub mod commands;

pub use command::{CommandRegistry, ManagementCommand};
pub use commands::{register_builtin_commands, CheckCommand, ClearCacheCommand, RenderCommand};
