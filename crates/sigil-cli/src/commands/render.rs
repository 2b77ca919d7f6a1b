//! The `render` command.
//!
//! Renders a named template from disk against a JSON context and emits the
//! result through an output sink (standard output by default).

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches};
use serde_json::{Map, Value as JsonValue};
use sigil_core::{settings_loader, Settings, SigilError, SigilResult};
use sigil_template::{Context, Engine, Output, OutputSink, WriterSink};
use tracing::info;

use crate::command::ManagementCommand;

/// Renders a template to an output sink.
pub struct RenderCommand {
    sink: Arc<dyn OutputSink>,
}

impl RenderCommand {
    /// A render command writing to standard output.
    pub fn new() -> Self {
        Self::with_sink(Arc::new(WriterSink::stdout()))
    }

    /// A render command writing to `sink`.
    pub fn with_sink(sink: Arc<dyn OutputSink>) -> Self {
        Self { sink }
    }
}

impl Default for RenderCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the command-line overrides to the loaded settings.
fn apply_flags(settings: &mut Settings, matches: &ArgMatches) {
    if let Some(dirs) = matches.get_many::<PathBuf>("dir") {
        settings.templates.dirs.extend(dirs.cloned());
    }
    if settings.templates.dirs.is_empty() {
        settings.templates.dirs.push(PathBuf::from("."));
    }
    if let Some(left) = matches.get_one::<String>("left") {
        settings.templates.left_delimiter.clone_from(left);
    }
    if let Some(right) = matches.get_one::<String>("right") {
        settings.templates.right_delimiter.clone_from(right);
    }
    if matches.get_flag("no-cache") {
        settings.cache.enabled = false;
    }
    if matches.get_flag("no-escape") {
        settings.templates.auto_escape = false;
    }
}

/// Sets `path` (dot separated) in `map`, creating objects along the way.
fn set_path(map: &mut Map<String, JsonValue>, path: &str, value: JsonValue) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if !entry.is_object() {
                *entry = JsonValue::Object(Map::new());
            }
            if let JsonValue::Object(inner) = entry {
                set_path(inner, rest, value);
            }
        }
    }
}

/// Builds the render context from `--context` and `--set`.
///
/// `--set` values are parsed as JSON when they are valid JSON and taken as
/// plain strings otherwise.
pub fn build_context(
    context_file: Option<&PathBuf>,
    assignments: impl IntoIterator<Item = String>,
) -> SigilResult<Context> {
    let mut map = match context_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            match serde_json::from_str::<JsonValue>(&raw) {
                Ok(JsonValue::Object(map)) => map,
                Ok(_) => {
                    return Err(SigilError::SerializationError(format!(
                        "Context file '{}' must contain a JSON object",
                        path.display()
                    )))
                }
                Err(e) => {
                    return Err(SigilError::SerializationError(format!(
                        "Invalid JSON in '{}': {e}",
                        path.display()
                    )))
                }
            }
        }
        None => Map::new(),
    };

    for assignment in assignments {
        let (key, raw) = assignment.split_once('=').ok_or_else(|| {
            SigilError::ConfigurationError(format!(
                "Invalid --set '{assignment}': expected key=value"
            ))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(SigilError::ConfigurationError(format!(
                "Invalid --set '{assignment}': empty key"
            )));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()));
        set_path(&mut map, key, value);
    }

    Ok(Context::from(map))
}

impl ManagementCommand for RenderCommand {
    fn name(&self) -> &'static str {
        "render"
    }

    fn help(&self) -> &'static str {
        "Render a template against a JSON context"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            Arg::new("name")
                .required(true)
                .help("Template name, relative to the template directories"),
        )
        .arg(
            Arg::new("dir")
                .long("dir")
                .short('d')
                .action(ArgAction::Append)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Template directory (repeatable)"),
        )
        .arg(
            Arg::new("context")
                .long("context")
                .short('c')
                .value_parser(clap::value_parser!(PathBuf))
                .help("JSON file holding the render context"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(clap::value_parser!(PathBuf))
                .help("TOML settings file"),
        )
        .arg(
            Arg::new("set")
                .long("set")
                .short('s')
                .action(ArgAction::Append)
                .help("Context assignment key=value (repeatable)"),
        )
        .arg(Arg::new("left").long("left").help("Left tag delimiter"))
        .arg(Arg::new("right").long("right").help("Right tag delimiter"))
        .arg(
            Arg::new("no-cache")
                .long("no-cache")
                .action(ArgAction::SetTrue)
                .help("Disable the render cache"),
        )
        .arg(
            Arg::new("no-escape")
                .long("no-escape")
                .action(ArgAction::SetTrue)
                .help("Do not HTML-escape context values"),
        )
    }

    fn handle(&self, matches: &ArgMatches, settings: &Settings) -> SigilResult<()> {
        let mut settings = match matches.get_one::<PathBuf>("config") {
            Some(path) => settings_loader::from_toml_file_with_env(path)?,
            None => settings.clone(),
        };
        apply_flags(&mut settings, matches);

        let name = matches
            .get_one::<String>("name")
            .map(String::as_str)
            .unwrap_or_default();
        let ctx = build_context(
            matches.get_one::<PathBuf>("context"),
            matches.get_many::<String>("set").into_iter().flatten().cloned(),
        )?;

        let engine = Engine::from_settings(&settings.templates, &settings.cache)?;
        info!(template = name, "Rendering template");
        engine.render(name, &ctx, Output::Emit(self.sink.as_ref()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandRegistry;
    use sigil_template::StringSink;

    fn run(args: &[&str], settings: &Settings) -> (SigilResult<()>, String) {
        let sink = Arc::new(StringSink::new());
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(RenderCommand::with_sink(
            Arc::clone(&sink) as Arc<dyn OutputSink>
        )));
        let mut argv = vec!["sigil", "render"];
        argv.extend_from_slice(args);
        let matches = registry.build_cli().try_get_matches_from(argv).unwrap();
        let result = registry.execute(&matches, settings);
        (result, sink.contents())
    }

    #[test]
    fn test_render_with_context_file_and_set() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.html"), "Hello {name|upper} ({user.role}, {n})").unwrap();
        let ctx_file = dir.path().join("ctx.json");
        std::fs::write(&ctx_file, r#"{"name": "ana", "n": 1}"#).unwrap();

        let dir_arg = dir.path().to_str().unwrap();
        let ctx_arg = ctx_file.to_str().unwrap();
        let (result, out) = run(
            &["hello", "--dir", dir_arg, "--context", ctx_arg, "--set", "user.role=admin", "--set", "n=2", "--no-cache"],
            &Settings::default(),
        );
        result.unwrap();
        assert_eq!(out, "Hello ANA (admin, 2)");
    }

    #[test]
    fn test_render_delimiters_and_no_escape() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.html"), "<%bio%>{bio}").unwrap();
        let dir_arg = dir.path().to_str().unwrap();
        let (result, out) = run(
            &["page", "-d", dir_arg, "--left", "<%", "--right", "%>", "--set", "bio=<b>", "--no-escape"],
            &Settings::default(),
        );
        result.unwrap();
        assert_eq!(out, "<b>{bio}");
    }

    #[test]
    fn test_render_missing_template_fails() {
        let dir = tempfile::tempdir().unwrap();
        let dir_arg = dir.path().to_str().unwrap();
        let (result, out) = run(&["ghost", "--dir", dir_arg], &Settings::default());
        assert!(matches!(result, Err(SigilError::TemplateNotFound(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_render_with_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.tpl"), "[[x]]").unwrap();
        let config = dir.path().join("sigil.toml");
        std::fs::write(
            &config,
            format!(
                "[templates]\ndirs = [{:?}]\nextension = \"tpl\"\nleft_delimiter = \"[[\"\nright_delimiter = \"]]\"\n\n[cache]\nenabled = false\n",
                dir.path().to_str().unwrap()
            ),
        )
        .unwrap();
        let (result, out) = run(
            &["page", "--config", config.to_str().unwrap(), "--set", "x=42"],
            &Settings::default(),
        );
        result.unwrap();
        assert_eq!(out, "42");
    }

    #[test]
    fn test_build_context_rejects_bad_input() {
        assert!(build_context(None, vec!["novalue".to_string()]).is_err());
        assert!(build_context(None, vec!["=x".to_string()]).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctx.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            build_context(Some(&path), Vec::new()),
            Err(SigilError::SerializationError(_))
        ));
    }

    #[test]
    fn test_build_context_values() {
        let ctx = build_context(
            None,
            vec![
                "flag=true".to_string(),
                "count=3".to_string(),
                "word=hello world".to_string(),
                "a.b.c=deep".to_string(),
            ],
        )
        .unwrap();
        assert_eq!(ctx.get("flag"), Some(&sigil_template::Value::Bool(true)));
        assert_eq!(ctx.get("count"), Some(&sigil_template::Value::Integer(3)));
        assert_eq!(ctx.get("word").map(|v| v.to_display_string()).as_deref(), Some("hello world"));
        let a = ctx.get("a").unwrap().to_display_string();
        assert_eq!(a, r#"{"b":{"c":"deep"}}"#);
    }
}
