//! Render context and values.
//!
//! A [`Context`] is an insertion-ordered mapping from names to [`Value`]s.
//! Contexts are snapshots: rendering derives new contexts (merged defaults,
//! escaped copies, per-iteration overlays) and never mutates the caller's.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sigil_core::error::{SigilError, SigilResult};

/// A dynamic value in a render context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// The absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A 64-bit integer.
    Integer(i64),
    /// A 64-bit float.
    Float(f64),
    /// A string.
    String(String),
    /// An ordered sequence of values (list of rows).
    List(Vec<Value>),
    /// A nested context.
    Object(Context),
}

impl Value {
    /// Returns `true` for values that render directly as text.
    pub const fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Object(_))
    }

    /// Converts this value to the text substituted into a template.
    ///
    /// `Null` renders as the empty string, booleans as `true`/`false`. Lists
    /// and objects render as JSON.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
            Self::List(_) | Self::Object(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }

    /// Returns the string contents if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Interprets this value as a number. Numeric-looking strings count.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::String(s) => parse_number(s),
            _ => None,
        }
    }

    /// Returns `true` if this value counts as empty.
    ///
    /// Empty values are `Null`, `false`, zero, `""`, `"0"` and empty
    /// lists or objects.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Integer(i) => *i == 0,
            Self::Float(f) => *f == 0.0,
            Self::String(s) => s.is_empty() || s == "0",
            Self::List(l) => l.is_empty(),
            Self::Object(o) => o.is_empty(),
        }
    }

    /// Returns `true` if this value is considered true in a condition.
    pub fn is_truthy(&self) -> bool {
        !self.is_empty()
    }

    /// Returns a copy with every string HTML-escaped, recursively.
    #[must_use]
    pub fn escaped(&self) -> Self {
        match self {
            Self::String(s) => Self::String(escape_html(s)),
            Self::List(items) => Self::List(items.iter().map(Self::escaped).collect()),
            Self::Object(ctx) => Self::Object(ctx.escaped()),
            other => other.clone(),
        }
    }
}

/// Parses a string that looks like a number (leading/trailing whitespace allowed).
pub(crate) fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s.starts_with('+') {
        return None;
    }
    // Reject forms like "inf" or "NaN" that Rust parses but are not numeric text.
    if !s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | 'e' | 'E' | '+'))
    {
        return None;
    }
    s.parse::<f64>().ok()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<Context> for Value {
    fn from(ctx: Context) -> Self {
        Self::Object(ctx)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(arr) => Self::List(arr.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => Self::Object(Context::from(map)),
        }
    }
}

/// An ordered mapping of names to values that templates render against.
///
/// # Examples
///
/// ```
/// use sigil_template::context::{Context, Value};
///
/// let mut ctx = Context::new();
/// ctx.set("name", "ana");
/// ctx.set("tags", vec!["a", "b"]);
/// assert_eq!(ctx.get("name"), Some(&Value::from("ana")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    values: IndexMap<String, Value>,
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a context from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns a `SerializationError` if the text is not valid JSON or is not
    /// a JSON object.
    pub fn from_json(json: &str) -> SigilResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| SigilError::SerializationError(format!("Invalid context JSON: {e}")))?;
        match value {
            serde_json::Value::Object(map) => Ok(Self::from(map)),
            other => Err(SigilError::SerializationError(format!(
                "Context JSON must be an object, got: {other}"
            ))),
        }
    }

    /// Sets a value, replacing any existing value under the same key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder form of [`Context::set`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The number of top-level entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the context has no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Copies every entry of `other` into this context; `other` wins on conflicts.
    pub fn extend_from(&mut self, other: &Self) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }

    /// Returns a new context with `other` layered over this one.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.extend_from(other);
        out
    }

    /// Returns a copy with every string value HTML-escaped.
    #[must_use]
    pub fn escaped(&self) -> Self {
        Self {
            values: self
                .values
                .iter()
                .map(|(k, v)| (k.clone(), v.escaped()))
                .collect(),
        }
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Context {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            values: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Escapes HTML special characters in a string.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}
