//! Filter pipeline.
//!
//! A filter is a named, parameterized transform of a single [`Value`].
//! Filters are held in a [`FilterRegistry`] keyed by name; a variable tag such
//! as `{title|trim|limit_chars:20}` runs its chain left to right, each stage
//! receiving the previous stage's output.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use sha2::{Digest, Sha256};
use sigil_core::error::{SigilError, SigilResult};
use tracing::{debug, warn};

use crate::context::{escape_html, Value};

/// A template filter.
///
/// Takes a value and the tag's string parameters and returns a transformed value.
pub trait Filter: Send + Sync {
    /// Returns the filter name.
    fn name(&self) -> &str;

    /// Applies the filter to a value with the given parameters.
    fn apply(&self, value: &Value, args: &[String]) -> SigilResult<Value>;
}

/// A filter backed by a closure.
struct FnFilter<F> {
    name: String,
    func: F,
}

impl<F> Filter for FnFilter<F>
where
    F: Fn(&Value, &[String]) -> SigilResult<Value> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, value: &Value, args: &[String]) -> SigilResult<Value> {
        (self.func)(value, args)
    }
}

/// One stage of a filter chain: `name[:param1,param2,...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub name: String,
    pub params: Vec<String>,
}

impl FilterSpec {
    /// Parses a single stage. Parameters are trimmed.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return None;
        }
        let (name, params) = match spec.split_once(':') {
            Some((name, params)) => (
                name.trim(),
                params.split(',').map(|p| p.trim().to_string()).collect(),
            ),
            None => (spec, Vec::new()),
        };
        Some(Self {
            name: name.to_string(),
            params,
        })
    }
}

/// Parses a `|`-separated filter chain.
pub fn parse_chain(chain: &str) -> Vec<FilterSpec> {
    chain.split('|').filter_map(FilterSpec::parse).collect()
}

/// A registry of available template filters.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, Arc<dyn Filter>>,
}

impl FilterRegistry {
    /// Creates a new empty filter registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in filter.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        register_builtins(&mut r);
        r
    }

    /// Registers a filter under its own name, replacing any filter of that name.
    pub fn register(&mut self, filter: impl Filter + 'static) {
        let name = filter.name().to_string();
        self.filters.insert(name, Arc::new(filter));
    }

    /// Registers a filter under an explicit name.
    pub fn register_as(&mut self, name: impl Into<String>, filter: Arc<dyn Filter>) {
        self.filters.insert(name.into(), filter);
    }

    /// Registers a closure as a filter.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&Value, &[String]) -> SigilResult<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        self.filters.insert(
            name.clone(),
            Arc::new(FnFilter { name, func }),
        );
    }

    /// Returns `true` if a filter is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Applies a named filter to a value.
    ///
    /// # Errors
    ///
    /// Returns a `FilterError` if no filter is registered under `name` or the
    /// filter itself fails.
    pub fn apply(&self, name: &str, value: &Value, args: &[String]) -> SigilResult<Value> {
        let filter = self
            .filters
            .get(name)
            .ok_or_else(|| SigilError::FilterError(format!("Unknown filter: '{name}'")))?;
        filter.apply(value, args)
    }

    /// Runs a filter chain left to right.
    ///
    /// Unknown filter names are skipped. A failing stage passes its input
    /// through unchanged.
    pub fn apply_chain(&self, value: Value, chain: &[FilterSpec]) -> Value {
        chain.iter().fold(value, |current, spec| {
            let Some(filter) = self.filters.get(&spec.name) else {
                debug!(filter = %spec.name, "Skipping unknown filter");
                return current;
            };
            match filter.apply(&current, &spec.params) {
                Ok(next) => next,
                Err(e) => {
                    warn!(filter = %spec.name, error = %e, "Filter failed; value passed through");
                    current
                }
            }
        })
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.filters.keys().collect();
        names.sort();
        f.debug_struct("FilterRegistry").field("filters", &names).finish()
    }
}

/// Registers all built-in filters.
pub fn register_builtins(r: &mut FilterRegistry) {
    // String filters
    r.register(UpperFilter);
    r.register(LowerFilter);
    r.register(CapitalizeFilter);
    r.register(TrimFilter);
    r.register(LengthFilter);
    r.register(ReverseFilter);
    r.register(Nl2brFilter);
    r.register(EscFilter);
    r.register(LimitCharsFilter);
    r.register(LimitWordsFilter);
    r.register(HighlightFilter);

    // Hashing
    let hash: Arc<dyn Filter> = Arc::new(HashFilter);
    r.register_as("hash", Arc::clone(&hash));
    r.register_as("md5", hash);

    // Number filters
    let abs: Arc<dyn Filter> = Arc::new(AbsFilter);
    r.register_as("abs", Arc::clone(&abs));
    r.register_as("absolute", abs);
    r.register(RoundFilter);

    // Date filters
    r.register(DateFilter);
    r.register(DateModifyFilter);

    // Logic filters
    r.register(DefaultFilter);
}

fn required_arg<'a>(args: &'a [String], filter: &str, what: &str) -> SigilResult<&'a str> {
    args.first()
        .map(String::as_str)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| SigilError::FilterError(format!("{filter} requires a {what} parameter")))
}

fn limit_arg(args: &[String], filter: &str) -> SigilResult<usize> {
    let raw = required_arg(args, filter, "limit")?;
    raw.parse::<usize>()
        .map_err(|_| SigilError::FilterError(format!("{filter}: invalid limit '{raw}'")))
}

// ============================================================
// String filters
// ============================================================

struct UpperFilter;

impl Filter for UpperFilter {
    fn name(&self) -> &str {
        "upper"
    }
    fn apply(&self, value: &Value, _args: &[String]) -> SigilResult<Value> {
        Ok(Value::String(value.to_display_string().to_uppercase()))
    }
}

struct LowerFilter;

impl Filter for LowerFilter {
    fn name(&self) -> &str {
        "lower"
    }
    fn apply(&self, value: &Value, _args: &[String]) -> SigilResult<Value> {
        Ok(Value::String(value.to_display_string().to_lowercase()))
    }
}

/// Uppercases the first letter of every whitespace-separated word.
struct CapitalizeFilter;

impl Filter for CapitalizeFilter {
    fn name(&self) -> &str {
        "capitalize"
    }
    fn apply(&self, value: &Value, _args: &[String]) -> SigilResult<Value> {
        let s = value.to_display_string();
        let mut out = String::with_capacity(s.len());
        let mut at_word_start = true;
        for c in s.chars() {
            if at_word_start && !c.is_whitespace() {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            at_word_start = c.is_whitespace();
        }
        Ok(Value::String(out))
    }
}

struct TrimFilter;

impl Filter for TrimFilter {
    fn name(&self) -> &str {
        "trim"
    }
    fn apply(&self, value: &Value, _args: &[String]) -> SigilResult<Value> {
        Ok(Value::String(value.to_display_string().trim().to_string()))
    }
}

/// Character count of a string, or element count of a list or object.
struct LengthFilter;

impl Filter for LengthFilter {
    fn name(&self) -> &str {
        "length"
    }
    fn apply(&self, value: &Value, _args: &[String]) -> SigilResult<Value> {
        let len = match value {
            Value::List(items) => items.len(),
            Value::Object(ctx) => ctx.len(),
            other => other.to_display_string().chars().count(),
        };
        Ok(Value::Integer(i64::try_from(len).unwrap_or(i64::MAX)))
    }
}

struct ReverseFilter;

impl Filter for ReverseFilter {
    fn name(&self) -> &str {
        "reverse"
    }
    fn apply(&self, value: &Value, _args: &[String]) -> SigilResult<Value> {
        Ok(match value {
            Value::List(items) => Value::List(items.iter().rev().cloned().collect()),
            other => Value::String(other.to_display_string().chars().rev().collect()),
        })
    }
}

/// Inserts `<br />` before every line break (`\r\n`, `\n` or `\r`).
struct Nl2brFilter;

impl Filter for Nl2brFilter {
    fn name(&self) -> &str {
        "nl2br"
    }
    fn apply(&self, value: &Value, _args: &[String]) -> SigilResult<Value> {
        let s = value.to_display_string();
        let mut out = String::with_capacity(s.len());
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\r' if chars.peek() == Some(&'\n') => {
                    chars.next();
                    out.push_str("<br />\r\n");
                }
                '\n' | '\r' => {
                    out.push_str("<br />");
                    out.push(c);
                }
                _ => out.push(c),
            }
        }
        Ok(Value::String(out))
    }
}

struct EscFilter;

impl Filter for EscFilter {
    fn name(&self) -> &str {
        "esc"
    }
    fn apply(&self, value: &Value, _args: &[String]) -> SigilResult<Value> {
        Ok(Value::String(escape_html(&value.to_display_string())))
    }
}

struct LimitCharsFilter;

impl Filter for LimitCharsFilter {
    fn name(&self) -> &str {
        "limit_chars"
    }
    fn apply(&self, value: &Value, args: &[String]) -> SigilResult<Value> {
        let limit = limit_arg(args, self.name())?;
        Ok(Value::String(
            value.to_display_string().chars().take(limit).collect(),
        ))
    }
}

/// Keeps the first `limit` space-separated words.
struct LimitWordsFilter;

impl Filter for LimitWordsFilter {
    fn name(&self) -> &str {
        "limit_words"
    }
    fn apply(&self, value: &Value, args: &[String]) -> SigilResult<Value> {
        let limit = limit_arg(args, self.name())?;
        let s = value.to_display_string();
        let words: Vec<&str> = s.split(' ').take(limit).collect();
        Ok(Value::String(words.join(" ")))
    }
}

/// Wraps every case-sensitive occurrence of the term in `<strong>`.
struct HighlightFilter;

impl Filter for HighlightFilter {
    fn name(&self) -> &str {
        "highlight"
    }
    fn apply(&self, value: &Value, args: &[String]) -> SigilResult<Value> {
        let s = value.to_display_string();
        let term = args.first().map_or("", String::as_str);
        if term.is_empty() {
            return Ok(Value::String(s));
        }
        Ok(Value::String(
            s.replace(term, &format!("<strong>{term}</strong>")),
        ))
    }
}

/// Lowercase hex SHA-256 of the value's text.
struct HashFilter;

impl Filter for HashFilter {
    fn name(&self) -> &str {
        "hash"
    }
    fn apply(&self, value: &Value, _args: &[String]) -> SigilResult<Value> {
        let digest = Sha256::digest(value.to_display_string().as_bytes());
        Ok(Value::String(format!("{digest:x}")))
    }
}

// ============================================================
// Number filters
// ============================================================

struct AbsFilter;

impl Filter for AbsFilter {
    fn name(&self) -> &str {
        "abs"
    }
    fn apply(&self, value: &Value, _args: &[String]) -> SigilResult<Value> {
        match value {
            Value::Integer(i) => Ok(i
                .checked_abs()
                .map_or_else(|| Value::Float(value.as_f64().unwrap_or_default().abs()), Value::Integer)),
            other => other.as_f64().map(|f| Value::Float(f.abs())).ok_or_else(|| {
                SigilError::FilterError(format!(
                    "abs: '{}' is not a number",
                    other.to_display_string()
                ))
            }),
        }
    }
}

/// Beyond this many digits `10^precision` leaves the `f64` range.
const MAX_ROUND_PRECISION: i32 = 308;

/// Rounds half away from zero to an optional number of decimal places.
///
/// Precision is clamped to the range `f64` can scale by; a value too large
/// to scale at that precision is returned as is.
struct RoundFilter;

impl Filter for RoundFilter {
    fn name(&self) -> &str {
        "round"
    }
    fn apply(&self, value: &Value, args: &[String]) -> SigilResult<Value> {
        let number = value.as_f64().ok_or_else(|| {
            SigilError::FilterError(format!(
                "round: '{}' is not a number",
                value.to_display_string()
            ))
        })?;
        let precision = match args.first().map(|a| a.trim()).filter(|a| !a.is_empty()) {
            Some(p) => p.parse::<i32>().map_err(|_| {
                SigilError::FilterError(format!("round: invalid precision '{p}'"))
            })?,
            None => 0,
        };
        let factor = 10f64.powi(precision.clamp(-MAX_ROUND_PRECISION, MAX_ROUND_PRECISION));
        let scaled = number * factor;
        if !scaled.is_finite() {
            return Ok(Value::Float(number));
        }
        Ok(Value::Float(scaled.round() / factor))
    }
}

// ============================================================
// Date filters
// ============================================================

/// Formats a date/time with PHP-style format characters.
struct DateFilter;

impl Filter for DateFilter {
    fn name(&self) -> &str {
        "date"
    }
    fn apply(&self, value: &Value, args: &[String]) -> SigilResult<Value> {
        let format = required_arg(args, self.name(), "format")?;
        let dt = parse_datetime(value)?;
        Ok(Value::String(format_php_date(&dt, format)))
    }
}

/// Applies a relative modification and renders as `Y-m-d H:i:s`.
struct DateModifyFilter;

impl Filter for DateModifyFilter {
    fn name(&self) -> &str {
        "date_modify"
    }
    fn apply(&self, value: &Value, args: &[String]) -> SigilResult<Value> {
        let modifier = required_arg(args, self.name(), "modifier")?;
        let dt = modify_datetime(parse_datetime(value)?, modifier)?;
        Ok(Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
    }
}

fn from_timestamp(ts: i64) -> SigilResult<NaiveDateTime> {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| SigilError::FilterError(format!("Timestamp out of range: {ts}")))
}

/// Parses a value as a date/time.
///
/// Accepts RFC 3339, `Y-m-d H:i:s`, `Y-m-d\TH:i:s`, `Y-m-d H:i`, `Y-m-d`
/// and integer Unix timestamps.
pub fn parse_datetime(value: &Value) -> SigilResult<NaiveDateTime> {
    if let Value::Integer(ts) = value {
        return from_timestamp(*ts);
    }

    let raw = value.to_display_string();
    let text = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.naive_local());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt);
        }
    }
    if let Some(dt) = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(dt);
    }
    if let Ok(ts) = text.parse::<i64>() {
        return from_timestamp(ts);
    }

    Err(SigilError::FilterError(format!(
        "Cannot parse '{text}' as a date"
    )))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map_or(31, |d| d.day())
}

/// Renders a date/time using PHP `date()` format characters.
///
/// Unknown characters are copied through; `\` escapes the next character.
pub fn format_php_date(dt: &NaiveDateTime, format: &str) -> String {
    let mut out = String::new();
    let mut chars = format.chars();

    while let Some(ch) = chars.next() {
        let written = match ch {
            'd' => write!(out, "{:02}", dt.day()),
            'D' => write!(out, "{}", dt.format("%a")),
            'j' => write!(out, "{}", dt.day()),
            'l' => write!(out, "{}", dt.format("%A")),
            'N' => write!(out, "{}", dt.weekday().number_from_monday()),
            'w' => write!(out, "{}", dt.weekday().num_days_from_sunday()),
            'z' => write!(out, "{}", dt.ordinal0()),
            'W' => write!(out, "{:02}", dt.iso_week().week()),
            'F' => write!(out, "{}", dt.format("%B")),
            'm' => write!(out, "{:02}", dt.month()),
            'M' => write!(out, "{}", dt.format("%b")),
            'n' => write!(out, "{}", dt.month()),
            't' => write!(out, "{}", days_in_month(dt.year(), dt.month())),
            'L' => {
                let leap = NaiveDate::from_ymd_opt(dt.year(), 2, 29).is_some();
                write!(out, "{}", u8::from(leap))
            }
            'Y' => write!(out, "{}", dt.year()),
            'y' => write!(out, "{:02}", dt.year().rem_euclid(100)),
            'a' => out.write_str(if dt.hour() < 12 { "am" } else { "pm" }),
            'A' => out.write_str(if dt.hour() < 12 { "AM" } else { "PM" }),
            'g' => write!(out, "{}", dt.hour12().1),
            'G' => write!(out, "{}", dt.hour()),
            'h' => write!(out, "{:02}", dt.hour12().1),
            'H' => write!(out, "{:02}", dt.hour()),
            'i' => write!(out, "{:02}", dt.minute()),
            's' => write!(out, "{:02}", dt.second()),
            'U' => write!(out, "{}", dt.and_utc().timestamp()),
            'c' => write!(out, "{}", dt.format("%Y-%m-%dT%H:%M:%S+00:00")),
            'r' => write!(out, "{}", dt.format("%a, %d %b %Y %H:%M:%S +0000")),
            '\\' => match chars.next() {
                Some(next) => out.write_char(next),
                None => Ok(()),
            },
            other => out.write_char(other),
        };
        // Writing into a String cannot fail.
        written.ok();
    }

    out
}

fn at_midnight(dt: NaiveDateTime) -> SigilResult<NaiveDateTime> {
    dt.date()
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| SigilError::FilterError("Invalid date".to_string()))
}

fn shift(dt: NaiveDateTime, amount: i64, unit: &str) -> SigilResult<NaiveDateTime> {
    let overflow = || SigilError::FilterError(format!("Date modification out of range: {amount} {unit}"));
    let unit = unit.trim_end_matches('s');

    let by_months = |months: i64| -> SigilResult<NaiveDateTime> {
        let magnitude = u32::try_from(months.unsigned_abs()).map_err(|_| overflow())?;
        let shifted = if months >= 0 {
            dt.checked_add_months(Months::new(magnitude))
        } else {
            dt.checked_sub_months(Months::new(magnitude))
        };
        shifted.ok_or_else(overflow)
    };

    let delta = match unit {
        "year" => return by_months(amount.checked_mul(12).ok_or_else(overflow)?),
        "month" => return by_months(amount),
        "week" => amount.checked_mul(7).and_then(TimeDelta::try_days),
        "day" => TimeDelta::try_days(amount),
        "hour" => TimeDelta::try_hours(amount),
        "minute" | "min" => TimeDelta::try_minutes(amount),
        "second" | "sec" => TimeDelta::try_seconds(amount),
        other => {
            return Err(SigilError::FilterError(format!(
                "Unknown date unit: '{other}'"
            )))
        }
    };

    delta
        .and_then(|d| dt.checked_add_signed(d))
        .ok_or_else(overflow)
}

/// Applies a relative modifier such as `+1 day -2 hours` or `tomorrow`.
pub fn modify_datetime(dt: NaiveDateTime, modifier: &str) -> SigilResult<NaiveDateTime> {
    let lowered = modifier.to_lowercase();
    let mut tokens = lowered.split_whitespace();
    let mut dt = dt;

    while let Some(token) = tokens.next() {
        dt = match token {
            "now" => dt,
            "today" | "midnight" => at_midnight(dt)?,
            "tomorrow" => shift(at_midnight(dt)?, 1, "day")?,
            "yesterday" => shift(at_midnight(dt)?, -1, "day")?,
            _ => {
                let split = token
                    .char_indices()
                    .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && matches!(c, '+' | '-'))))
                    .map_or(token.len(), |(i, _)| i);
                let (number, unit) = token.split_at(split);
                let amount = number.parse::<i64>().map_err(|_| {
                    SigilError::FilterError(format!("Invalid date modifier: '{modifier}'"))
                })?;
                let unit = if unit.is_empty() {
                    tokens.next().ok_or_else(|| {
                        SigilError::FilterError(format!("Missing unit in date modifier: '{modifier}'"))
                    })?
                } else {
                    unit
                };
                shift(dt, amount, unit)?
            }
        };
    }

    Ok(dt)
}

// ============================================================
// Logic filters
// ============================================================

/// Returns the fallback when the value is empty (`Null`, `false`, `0`, `""`, `"0"`).
struct DefaultFilter;

impl Filter for DefaultFilter {
    fn name(&self) -> &str {
        "default"
    }
    fn apply(&self, value: &Value, args: &[String]) -> SigilResult<Value> {
        if value.is_empty() {
            Ok(Value::String(args.first().cloned().unwrap_or_default()))
        } else {
            Ok(value.clone())
        }
    }
}
