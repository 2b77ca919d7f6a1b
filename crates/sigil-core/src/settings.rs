//! Settings for the sigil template engine.
//!
//! [`Settings`] holds everything needed to build a configured engine: where
//! templates live, which delimiters mark a tag, whether the context is
//! escaped before rendering, and how rendered output is cached.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Template loading and syntax configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSettings {
    /// Directories to search for template files, in order.
    pub dirs: Vec<PathBuf>,
    /// Extension appended to template names that have none (without the dot).
    pub extension: Option<String>,
    /// The opening tag delimiter.
    pub left_delimiter: String,
    /// The closing tag delimiter.
    pub right_delimiter: String,
    /// Whether string values in the render context are HTML-escaped before rendering.
    pub auto_escape: bool,
    /// Whether unresolved variable tags are replaced by the empty string.
    pub clear_unresolved: bool,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            extension: Some("html".to_string()),
            left_delimiter: "{".to_string(),
            right_delimiter: "}".to_string(),
            auto_escape: true,
            clear_unresolved: false,
        }
    }
}

/// Render cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Whether rendered output is cached.
    pub enabled: bool,
    /// The cache backend: `"memory"` or `"file"`.
    pub backend: String,
    /// Directory used by the `"file"` backend.
    pub location: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: "memory".to_string(),
            location: None,
        }
    }
}

/// The complete set of sigil settings.
///
/// # Examples
///
/// ```
/// use sigil_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.templates.left_delimiter, "{");
/// assert!(settings.cache.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,
    /// The minimum log level (`trace`, `debug`, `info`, `warn`, `error`) or an env-filter directive.
    pub log_level: String,
    /// Template configuration.
    pub templates: TemplateSettings,
    /// Render cache configuration.
    pub cache: CacheSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            templates: TemplateSettings::default(),
            cache: CacheSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.debug);
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.templates.extension.as_deref(), Some("html"));
        assert_eq!(settings.templates.right_delimiter, "}");
        assert!(settings.templates.auto_escape);
        assert!(!settings.templates.clear_unresolved);
        assert_eq!(settings.cache.backend, "memory");
        assert!(settings.cache.location.is_none());
    }

    #[test]
    fn test_settings_serde_roundtrip_preserves_values() {
        let mut settings = Settings::default();
        settings.templates.dirs.push(PathBuf::from("/srv/templates"));
        settings.cache.backend = "file".to_string();

        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
