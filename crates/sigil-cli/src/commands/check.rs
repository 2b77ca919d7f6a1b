//! The `check` command.
//!
//! Validates the template and cache settings before anything is rendered.

use sigil_core::{Settings, SigilError, SigilResult};
use sigil_template::Engine;

use crate::command::ManagementCommand;

/// Runs configuration checks.
pub struct CheckCommand;

/// The result of a single check.
#[derive(Debug, Clone)]
pub struct CheckMessage {
    pub level: CheckLevel,
    pub msg: String,
    pub hint: Option<String>,
    /// A unique identifier for this check (e.g. "templates.E001").
    pub id: String,
}

/// Severity levels for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckLevel {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

fn message(level: CheckLevel, id: &str, msg: String, hint: Option<&str>) -> CheckMessage {
    CheckMessage {
        level,
        msg,
        hint: hint.map(str::to_string),
        id: id.to_string(),
    }
}

/// Runs every check against the given settings.
pub fn run_checks(settings: &Settings) -> Vec<CheckMessage> {
    let mut messages = Vec::new();
    let templates = &settings.templates;

    if templates.dirs.is_empty() {
        messages.push(message(
            CheckLevel::Warning,
            "templates.W001",
            "No template directories configured".to_string(),
            Some("Set templates.dirs or SIGIL_TEMPLATE_DIRS"),
        ));
    }
    for dir in templates.dirs.iter().filter(|d| !d.is_dir()) {
        messages.push(message(
            CheckLevel::Error,
            "templates.E001",
            format!("Template directory '{}' does not exist", dir.display()),
            None,
        ));
    }

    if templates.left_delimiter.is_empty() || templates.right_delimiter.is_empty() {
        messages.push(message(
            CheckLevel::Error,
            "templates.E002",
            "Template delimiters must not be empty".to_string(),
            None,
        ));
    } else if templates.left_delimiter == templates.right_delimiter {
        messages.push(message(
            CheckLevel::Warning,
            "templates.W002",
            format!(
                "Left and right delimiters are both '{}'",
                templates.left_delimiter
            ),
            Some("Identical delimiters make adjacent tags ambiguous"),
        ));
    }

    let cache = &settings.cache;
    match cache.backend.as_str() {
        "memory" => {}
        "file" if cache.location.is_none() => messages.push(message(
            CheckLevel::Error,
            "cache.E002",
            "The file cache backend has no location".to_string(),
            Some("Set cache.location or SIGIL_CACHE_DIR"),
        )),
        "file" => {}
        other => messages.push(message(
            CheckLevel::Error,
            "cache.E001",
            format!("Unknown cache backend '{other}'"),
            Some("Use \"memory\" or \"file\""),
        )),
    }

    // Anything the individual checks missed still surfaces here.
    if messages.iter().all(|m| m.level < CheckLevel::Error) {
        if let Err(e) = Engine::from_settings(templates, cache) {
            messages.push(message(CheckLevel::Error, "engine.E001", e.to_string(), None));
        }
    }

    messages
}

impl ManagementCommand for CheckCommand {
    fn name(&self) -> &'static str {
        "check"
    }

    fn help(&self) -> &'static str {
        "Check template and cache settings"
    }

    fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> SigilResult<()> {
        let messages = run_checks(settings);

        if messages.is_empty() {
            tracing::info!("Settings check identified no issues");
            return Ok(());
        }

        let errors = messages.iter().filter(|m| m.level >= CheckLevel::Error).count();
        for msg in &messages {
            let hint_text = msg
                .hint
                .as_ref()
                .map_or(String::new(), |h| format!("\n\tHINT: {h}"));
            tracing::warn!("{} ({}): {}{}", msg.level, msg.id, msg.msg, hint_text);
        }
        tracing::info!("Settings check identified {} issue(s)", messages.len());

        if errors > 0 {
            return Err(SigilError::ConfigurationError(format!(
                "Settings check found {errors} error(s)"
            )));
        }
        Ok(())
    }
}
