//! Command framework for the `sigil` CLI.
//!
//! This module provides the [`ManagementCommand`] trait for defining CLI
//! commands and [`CommandRegistry`] for registering and dispatching them.
//!
//! ## Defining a Custom Command
//!
//! ```rust
//! use sigil_cli::command::ManagementCommand;
//! use sigil_core::{Settings, SigilResult};
//!
//! struct GreetCommand;
//!
//! impl ManagementCommand for GreetCommand {
//!     fn name(&self) -> &'static str { "greet" }
//!     fn help(&self) -> &'static str { "Say hello" }
//!
//!     fn handle(&self, _matches: &clap::ArgMatches, _settings: &Settings) -> SigilResult<()> {
//!         tracing::info!("Hello from sigil!");
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashMap;

use sigil_core::{Settings, SigilError, SigilResult};

/// A command that can be registered and invoked through the CLI.
pub trait ManagementCommand: Send + Sync {
    /// Returns the name of this command (used to invoke it from the CLI).
    fn name(&self) -> &'static str;

    /// Returns a short help description for this command.
    fn help(&self) -> &'static str;

    /// Adds custom arguments to the clap command.
    ///
    /// The default implementation returns the command unchanged.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Executes the command with the given argument matches and settings.
    fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> SigilResult<()>;
}

/// A registry of commands, keyed by name.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn ManagementCommand>>,
}

impl CommandRegistry {
    /// Creates a new empty command registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command. A command with the same name is replaced.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        let name = command.name().to_string();
        self.commands.insert(name, command);
    }

    /// Returns the command with the given name, if registered.
    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Returns a sorted list of all registered command names.
    pub fn list_commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds the top-level clap `Command` with one subcommand per entry.
    pub fn build_cli(&self) -> clap::Command {
        let mut app = clap::Command::new("sigil")
            .about("sigil template engine")
            .version(env!("CARGO_PKG_VERSION"))
            .subcommand_required(true);

        let mut entries: Vec<&dyn ManagementCommand> =
            self.commands.values().map(AsRef::as_ref).collect();
        entries.sort_by_key(|cmd| cmd.name());

        for cmd in entries {
            let subcmd = clap::Command::new(cmd.name()).about(cmd.help());
            app = app.subcommand(cmd.add_arguments(subcmd));
        }
        app
    }

    /// Dispatches to the subcommand named in `matches`.
    pub fn execute(&self, matches: &clap::ArgMatches, settings: &Settings) -> SigilResult<()> {
        let (name, sub_matches) = matches.subcommand().ok_or_else(|| {
            SigilError::ConfigurationError("No subcommand specified".to_string())
        })?;

        let cmd = self
            .get(name)
            .ok_or_else(|| SigilError::ConfigurationError(format!("Unknown command: {name}")))?;

        cmd.handle(sub_matches, settings)
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.list_commands())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestCommand {
        cmd_name: &'static str,
    }

    impl ManagementCommand for TestCommand {
        fn name(&self) -> &'static str {
            self.cmd_name
        }

        fn help(&self) -> &'static str {
            "A test command"
        }

        fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
            cmd.arg(
                clap::Arg::new("verbose")
                    .long("verbose")
                    .action(clap::ArgAction::SetTrue),
            )
        }

        fn handle(&self, _matches: &clap::ArgMatches, _settings: &Settings) -> SigilResult<()> {
            Ok(())
        }
    }

    struct FailingCommand;

    impl ManagementCommand for FailingCommand {
        fn name(&self) -> &'static str {
            "fail"
        }

        fn help(&self) -> &'static str {
            "A command that always fails"
        }

        fn handle(&self, _matches: &clap::ArgMatches, _settings: &Settings) -> SigilResult<()> {
            Err(SigilError::ConfigurationError("deliberate failure".to_string()))
        }
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = CommandRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand { cmd_name: "test" }));
        let cmd = registry.get("test").unwrap();
        assert_eq!(cmd.name(), "test");
        assert_eq!(cmd.help(), "A test command");
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_list_commands_sorted_and_replaced() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand { cmd_name: "zebra" }));
        registry.register(Box::new(TestCommand { cmd_name: "alpha" }));
        registry.register(Box::new(TestCommand { cmd_name: "alpha" }));
        assert_eq!(registry.list_commands(), vec!["alpha", "zebra"]);
    }

    #[test]
    fn test_build_cli_with_arguments() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand { cmd_name: "test" }));

        let matches = registry
            .build_cli()
            .try_get_matches_from(["sigil", "test", "--verbose"])
            .unwrap();
        let (name, sub_matches) = matches.subcommand().unwrap();
        assert_eq!(name, "test");
        assert!(sub_matches.get_flag("verbose"));
    }

    #[test]
    fn test_build_cli_requires_subcommand() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand { cmd_name: "test" }));
        assert!(registry.build_cli().try_get_matches_from(["sigil"]).is_err());
    }

    #[test]
    fn test_execute_success_and_failure() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand { cmd_name: "test" }));
        registry.register(Box::new(FailingCommand));
        let settings = Settings::default();

        let ok = registry.build_cli().try_get_matches_from(["sigil", "test"]).unwrap();
        assert!(registry.execute(&ok, &settings).is_ok());

        let fail = registry.build_cli().try_get_matches_from(["sigil", "fail"]).unwrap();
        assert!(registry.execute(&fail, &settings).is_err());
    }
}
