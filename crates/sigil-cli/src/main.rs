//! The `sigil` binary.

use std::process::ExitCode;

use sigil_cli::{register_builtin_commands, CommandRegistry};
use sigil_core::logging::setup_logging;
use sigil_core::settings_loader;

fn main() -> ExitCode {
    let settings = settings_loader::from_env();
    setup_logging(&settings);

    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);
    let matches = registry.build_cli().get_matches();

    match registry.execute(&matches, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("sigil: {e}");
            ExitCode::FAILURE
        }
    }
}
