//! Built-in commands.
//!
//! Each command implements the
//! [`ManagementCommand`](crate::command::ManagementCommand) trait.

pub mod check;
pub mod clearcache;
pub mod render;

pub use check::CheckCommand;
pub use clearcache::ClearCacheCommand;
pub use render::RenderCommand;

use crate::command::CommandRegistry;

/// Registers all built-in commands into the given registry.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(RenderCommand::new()));
    registry.register(Box::new(CheckCommand));
    registry.register(Box::new(ClearCacheCommand));
}
