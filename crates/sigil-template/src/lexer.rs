//! Delimiter lexer.
//!
//! Every tag grammar in sigil is parametric over a pair of literal delimiter
//! strings. [`TagSyntax`] compiles each grammar once for a given
//! [`Delimiters`] pair, escaping the delimiters so that characters special to
//! the regex engine are matched literally. [`find_tags`] and
//! [`find_closing`] are the two scanning primitives the processors build on.

use std::ops::Range;

use regex::Regex;
use sigil_core::error::{SigilError, SigilResult};

/// Grammar for a variable path: an identifier followed by `.` or `->` segments.
pub const PATH: &str = r"[A-Za-z_][A-Za-z0-9_]*(?:(?:\.|->)[A-Za-z0-9_]+)*";

/// Grammar for template names inside `extends:` / `include:` tags.
const TEMPLATE_NAME: &str = r"[\w./-]+";

/// A pair of literal tag delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    left: String,
    right: String,
}

impl Delimiters {
    /// Creates a delimiter pair.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if either delimiter is empty.
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> SigilResult<Self> {
        let left = left.into();
        let right = right.into();
        if left.is_empty() || right.is_empty() {
            return Err(SigilError::ConfigurationError(
                "Template delimiters must not be empty".to_string(),
            ));
        }
        Ok(Self { left, right })
    }

    /// The opening delimiter.
    pub fn left(&self) -> &str {
        &self.left
    }

    /// The closing delimiter.
    pub fn right(&self) -> &str {
        &self.right
    }

    /// Compiles `left <body> right` into a regex, with both delimiters escaped.
    ///
    /// `body` is regex source; it may contain capture groups.
    pub fn pattern(&self, body: &str) -> SigilResult<Regex> {
        let source = format!(
            "{}{}{}",
            regex::escape(&self.left),
            body,
            regex::escape(&self.right)
        );
        Regex::new(&source).map_err(|e| {
            SigilError::ConfigurationError(format!("Invalid tag pattern '{source}': {e}"))
        })
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            left: "{".to_string(),
            right: "}".to_string(),
        }
    }
}

/// One tag found in a template: its byte span and captured groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch {
    /// Byte range of the whole tag, delimiters included.
    pub span: Range<usize>,
    /// Captured groups, in order. Group 0 (the whole match) is excluded.
    pub groups: Vec<Option<String>>,
}

impl TagMatch {
    /// Returns the captured group at `index` (1-based, like regex groups), or `""`.
    pub fn group(&self, index: usize) -> &str {
        index
            .checked_sub(1)
            .and_then(|i| self.groups.get(i))
            .and_then(Option::as_deref)
            .unwrap_or("")
    }
}

/// Returns every match of `pattern` in `text`, in order.
pub fn find_tags(pattern: &Regex, text: &str) -> Vec<TagMatch> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(TagMatch {
                span: whole.range(),
                groups: caps
                    .iter()
                    .skip(1)
                    .map(|g| g.map(|m| m.as_str().to_string()))
                    .collect(),
            })
        })
        .collect()
}

/// An opening and a closing tag grammar that nest as a balanced pair.
///
/// Each side names the capture group holding the key the two tags must share
/// (for example the list path of a loop). Key groups are ignored when
/// scanning without a key.
#[derive(Debug, Clone, Copy)]
pub struct TagPair<'a> {
    pub open: &'a Regex,
    pub open_key: usize,
    pub close: &'a Regex,
    pub close_key: usize,
}

/// Finds the closing tag balancing an opening tag that ends at `from`.
///
/// With a `key`, only tags whose key group equals it take part in the depth
/// count, so unrelated pairs inside the body are skipped as a unit. Returns
/// the span of the matching closing tag.
pub fn find_closing(
    text: &str,
    from: usize,
    pair: TagPair<'_>,
    key: Option<&str>,
) -> Option<Range<usize>> {
    let rest = text.get(from..)?;

    let mut events: Vec<(Range<usize>, bool)> = find_tags(pair.open, rest)
        .into_iter()
        .filter(|t| key.map_or(true, |k| t.group(pair.open_key) == k))
        .map(|t| (t.span, true))
        .chain(
            find_tags(pair.close, rest)
                .into_iter()
                .filter(|t| key.map_or(true, |k| t.group(pair.close_key) == k))
                .map(|t| (t.span, false)),
        )
        .collect();
    events.sort_by_key(|(span, _)| span.start);

    let mut depth = 0usize;
    for (span, is_open) in events {
        if is_open {
            depth += 1;
        } else if depth == 0 {
            return Some(from + span.start..from + span.end);
        } else {
            depth -= 1;
        }
    }
    None
}

/// Every tag grammar compiled for one delimiter pair.
///
/// Built once at configuration time and shared read-only by all renders.
#[derive(Debug, Clone)]
pub struct TagSyntax {
    delimiters: Delimiters,
    /// `L path (| filters)? R`
    pub(crate) variable: Regex,
    /// `L (if|elseif|else|endif) args R`
    pub(crate) conditional: Regex,
    /// `L ident in path R`
    pub(crate) loop_open: Regex,
    /// `L end path R`
    pub(crate) loop_close: Regex,
    /// `L path R`, the opening tag of a legacy loop.
    pub(crate) legacy_open: Regex,
    /// `L / path R`
    pub(crate) legacy_close: Regex,
    /// `L block name R`
    pub(crate) block_open: Regex,
    /// `L endblock (name)? R`
    pub(crate) block_close: Regex,
    /// `L extends: name R`
    pub(crate) extends: Regex,
    /// `L include: name R`
    pub(crate) include: Regex,
    /// `L noparse R ... L /noparse R`
    pub(crate) noparse: Regex,
}

impl TagSyntax {
    /// Compiles all tag grammars for the given delimiters.
    pub fn new(delimiters: Delimiters) -> SigilResult<Self> {
        let d = &delimiters;
        let noparse = Regex::new(&format!(
            r"(?s){l}\s*noparse\s*{r}(.*?){l}\s*/\s*noparse\s*{r}",
            l = regex::escape(d.left()),
            r = regex::escape(d.right()),
        ))
        .map_err(|e| SigilError::ConfigurationError(format!("Invalid noparse pattern: {e}")))?;

        Ok(Self {
            variable: d.pattern(&format!(r"\s*({PATH})\s*(?:\|\s*([^\n]*?))?\s*"))?,
            conditional: d.pattern(r"\s*(elseif|else|endif|if)\b\s*(.*?)\s*")?,
            loop_open: d.pattern(&format!(r"\s*([A-Za-z_]\w*)\s+in\s+({PATH})\s*"))?,
            loop_close: d.pattern(&format!(r"\s*end\s+({PATH})\s*"))?,
            legacy_open: d.pattern(&format!(r"\s*({PATH})\s*"))?,
            legacy_close: d.pattern(&format!(r"\s*/\s*({PATH})\s*"))?,
            block_open: d.pattern(r"\s*block\s+([\w.-]+)\s*")?,
            block_close: d.pattern(r"\s*endblock(?:\s+[\w.-]+)?\s*")?,
            extends: d.pattern(&format!(r"\s*extends?\s*:\s*({TEMPLATE_NAME})\s*"))?,
            include: d.pattern(&format!(r"\s*include\s*:\s*({TEMPLATE_NAME})\s*"))?,
            noparse,
            delimiters,
        })
    }

    /// The delimiters these grammars were compiled for.
    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }
}
