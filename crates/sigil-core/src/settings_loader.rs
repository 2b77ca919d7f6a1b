//! Settings loading from configuration files.
//!
//! This module loads [`Settings`] from TOML or JSON files and applies
//! environment variable overrides.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `SIGIL_DEBUG` | `debug` |
//! | `SIGIL_LOG_LEVEL` | `log_level` |
//! | `SIGIL_TEMPLATE_DIRS` | `templates.dirs` (OS path-list separated) |
//! | `SIGIL_AUTO_ESCAPE` | `templates.auto_escape` |
//! | `SIGIL_CACHE_ENABLED` | `cache.enabled` |
//! | `SIGIL_CACHE_DIR` | `cache.location` (also selects the `file` backend) |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use sigil_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file("sigil.toml").unwrap();
//! let settings = settings_loader::from_toml_file_with_env("sigil.toml").unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::SigilError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// Any fields not present in the TOML keep their default values.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, SigilError> {
    // Merge through serde_json so that partial tables keep their defaults.
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| SigilError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, SigilError> {
    from_toml_str(&read_config(path.as_ref(), "TOML")?)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, SigilError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
pub fn from_json_str(json_str: &str) -> Result<Settings, SigilError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| SigilError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;

    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, SigilError> {
    from_json_str(&read_config(path.as_ref(), "JSON")?)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `SIGIL_*` environment variable overrides to a settings struct.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides_with(settings, |key| std::env::var(key).ok());
}

/// Applies overrides from an arbitrary key lookup.
///
/// [`apply_env_overrides`] calls this with the process environment.
pub fn apply_overrides_with(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("SIGIL_DEBUG") {
        settings.debug = parse_flag(&val);
    }

    if let Some(val) = lookup("SIGIL_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("SIGIL_TEMPLATE_DIRS") {
        settings.templates.dirs = std::env::split_paths(&val)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
    }

    if let Some(val) = lookup("SIGIL_AUTO_ESCAPE") {
        settings.templates.auto_escape = parse_flag(&val);
    }

    if let Some(val) = lookup("SIGIL_CACHE_ENABLED") {
        settings.cache.enabled = parse_flag(&val);
    }

    if let Some(val) = lookup("SIGIL_CACHE_DIR") {
        settings.cache.backend = "file".to_string();
        settings.cache.location = Some(PathBuf::from(val));
    }
}

// ============================================================
// Helpers
// ============================================================

fn parse_flag(val: &str) -> bool {
    matches!(val.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn read_config(path: &Path, format: &str) -> Result<String, SigilError> {
    std::fs::read_to_string(path).map_err(|e| {
        SigilError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_over_defaults(value: serde_json::Value, format: &str) -> Result<Settings, SigilError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        SigilError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        SigilError::ConfigurationError(format!("Failed to deserialize settings from {format}: {e}"))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // ── TOML loading ────────────────────────────────────────────────

    #[test]
    fn test_from_toml_str_basic() {
        let toml = r#"
            debug = false
            log_level = "warn"

            [templates]
            left_delimiter = "{{"
            right_delimiter = "}}"
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.templates.left_delimiter, "{{");
        assert_eq!(settings.templates.right_delimiter, "}}");
        // Defaults preserved inside a partially specified table
        assert!(settings.templates.auto_escape);
        assert_eq!(settings.templates.extension.as_deref(), Some("html"));
    }

    #[test]
    fn test_from_toml_str_cache_table() {
        let toml = r#"
            [cache]
            enabled = false
            backend = "file"
            location = "/tmp/sigil-cache"
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert!(!settings.cache.enabled);
        assert_eq!(settings.cache.backend, "file");
        assert_eq!(
            settings.cache.location,
            Some(PathBuf::from("/tmp/sigil-cache"))
        );
    }

    #[test]
    fn test_from_toml_str_empty() {
        let settings = from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_from_toml_str_invalid() {
        let result = from_toml_str("[[invalid toml content");
        assert!(matches!(result, Err(SigilError::ConfigurationError(_))));
    }

    #[test]
    fn test_from_toml_str_wrong_type() {
        let result = from_toml_str("debug = \"sometimes\"");
        assert!(result.is_err());
    }

    // ── JSON loading ────────────────────────────────────────────────

    #[test]
    fn test_from_json_str_basic() {
        let json = r#"{
            "log_level": "debug",
            "templates": { "dirs": ["views", "layouts"], "extension": null }
        }"#;

        let settings = from_json_str(json).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(
            settings.templates.dirs,
            vec![PathBuf::from("views"), PathBuf::from("layouts")]
        );
        assert!(settings.templates.extension.is_none());
        assert_eq!(settings.templates.left_delimiter, "{");
    }

    #[test]
    fn test_from_json_str_invalid() {
        assert!(from_json_str("{not json").is_err());
    }

    // ── Files ───────────────────────────────────────────────────────

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sigil.toml");
        std::fs::write(&path, "log_level = \"error\"\n").unwrap();

        let settings = from_toml_file(&path).unwrap();
        assert_eq!(settings.log_level, "error");
    }

    #[test]
    fn test_from_toml_file_missing() {
        let result = from_toml_file("/nonexistent/sigil.toml");
        assert!(matches!(result, Err(SigilError::ConfigurationError(_))));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sigil.json");
        std::fs::write(&path, r#"{"cache": {"enabled": false}}"#).unwrap();

        let settings = from_json_file(&path).unwrap();
        assert!(!settings.cache.enabled);
        assert_eq!(settings.cache.backend, "memory");
    }

    // ── Overrides ───────────────────────────────────────────────────

    #[test]
    fn test_overrides_applied() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SIGIL_DEBUG", "0"),
            ("SIGIL_LOG_LEVEL", "trace"),
            ("SIGIL_AUTO_ESCAPE", "no"),
            ("SIGIL_CACHE_ENABLED", "yes"),
            ("SIGIL_CACHE_DIR", "/var/cache/sigil"),
        ]);

        let mut settings = Settings::default();
        apply_overrides_with(&mut settings, |k| vars.get(k).map(|v| (*v).to_string()));

        assert!(!settings.debug);
        assert_eq!(settings.log_level, "trace");
        assert!(!settings.templates.auto_escape);
        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.backend, "file");
        assert_eq!(
            settings.cache.location,
            Some(PathBuf::from("/var/cache/sigil"))
        );
    }

    #[test]
    fn test_overrides_template_dirs() {
        let joined = std::env::join_paths(["a", "b"]).unwrap();
        let joined = joined.to_string_lossy().into_owned();

        let mut settings = Settings::default();
        apply_overrides_with(&mut settings, |k| {
            (k == "SIGIL_TEMPLATE_DIRS").then(|| joined.clone())
        });
        assert_eq!(
            settings.templates.dirs,
            vec![PathBuf::from("a"), PathBuf::from("b")]
        );
    }

    #[test]
    fn test_no_overrides_keeps_defaults() {
        let mut settings = Settings::default();
        apply_overrides_with(&mut settings, |_| None);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" on "));
        assert!(!parse_flag("off"));
        assert!(!parse_flag(""));
    }
}
