//! Core error types for the sigil template engine.
//!
//! This module provides the [`SigilError`] enum covering every failure a
//! render can produce. Errors fall into two families:
//!
//! - **structural** errors (bad template name, missing template, composition
//!   cycle) abort the current render and surface to the caller;
//! - **contained** errors (malformed expression or tag, failing filter) are
//!   isolated to the construct that produced them, which degrades to its
//!   empty/else output while the rest of the render continues.
//!
//! A missing context value is never an error: lookups return `Option::None`.

use thiserror::Error;

/// The primary error type for the sigil template engine.
///
/// # Examples
///
/// ```
/// use sigil_core::error::SigilError;
///
/// let err = SigilError::TemplateNotFound("page.html".into());
/// assert!(err.is_structural());
/// assert_eq!(err.to_string(), "Template does not exist: page.html");
/// ```
#[derive(Error, Debug)]
pub enum SigilError {
    // ── Input ────────────────────────────────────────────────────────

    /// The template name given to a render call was empty or invalid.
    #[error("Invalid template name: {0}")]
    InvalidTemplateName(String),

    // ── Templates ────────────────────────────────────────────────────

    /// A template loader could not resolve the requested name.
    #[error("Template does not exist: {0}")]
    TemplateNotFound(String),

    /// A template contains a malformed expression or tag.
    #[error("Template syntax error: {0}")]
    TemplateSyntaxError(String),

    /// An `include` or `extends` chain re-entered a template already being composed.
    #[error("Composition error: {0}")]
    CompositionError(String),

    /// A filter could not transform its input.
    #[error("Filter error: {0}")]
    FilterError(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── Cache ────────────────────────────────────────────────────────

    /// A cache store failed to read or write an entry.
    #[error("Cache error: {0}")]
    CacheError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SigilError {
    /// Returns `true` for errors that must abort the render they occur in.
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidTemplateName(_) | Self::TemplateNotFound(_) | Self::CompositionError(_)
        )
    }

    /// Returns `true` for errors that stay local to the construct that raised them.
    pub const fn is_contained(&self) -> bool {
        matches!(self, Self::TemplateSyntaxError(_) | Self::FilterError(_))
    }
}

/// A convenience type alias for `Result<T, SigilError>`.
pub type SigilResult<T> = Result<T, SigilError>;
