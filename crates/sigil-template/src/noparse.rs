//! Protected regions.
//!
//! Text between `{noparse}` and `{/noparse}` is swapped for an opaque
//! placeholder before any other pass runs and swapped back, verbatim, at the
//! end of the render. Placeholders are built from private-use code points so
//! no tag grammar can match them.

use crate::lexer::TagSyntax;

const OPEN: char = '\u{E000}';
const CLOSE: char = '\u{E001}';

fn placeholder(index: usize) -> String {
    format!("{OPEN}noparse:{index}{CLOSE}")
}

/// Placeholder-to-content table for one render.
#[derive(Debug, Default)]
pub struct NoParseTable {
    regions: Vec<String>,
}

impl NoParseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every protected region in `text` with a placeholder.
    pub fn extract(&mut self, text: &str, syntax: &TagSyntax) -> String {
        syntax
            .noparse
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let content = caps.get(1).map_or("", |m| m.as_str());
                self.regions.push(content.to_string());
                placeholder(self.regions.len() - 1)
            })
            .into_owned()
    }

    /// Puts the original content back in place of every placeholder.
    pub fn restore(&self, text: &str) -> String {
        if self.regions.is_empty() || !text.contains(OPEN) {
            return text.to_string();
        }
        self.regions
            .iter()
            .enumerate()
            .fold(text.to_string(), |out, (i, content)| {
                out.replace(&placeholder(i), content)
            })
    }

    /// Number of extracted regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Delimiters;

    fn syntax() -> TagSyntax {
        TagSyntax::new(Delimiters::default()).unwrap()
    }

    #[test]
    fn test_extract_and_restore() {
        let mut table = NoParseTable::new();
        let text = "a {noparse}{name|upper}{if x}{/noparse} b";
        let extracted = table.extract(text, &syntax());
        assert_eq!(table.len(), 1);
        assert!(!extracted.contains("{name"));
        assert_eq!(table.restore(&extracted), "a {name|upper}{if x} b");
    }

    #[test]
    fn test_multiple_regions_keep_identity() {
        let mut table = NoParseTable::new();
        let extracted = table.extract("{noparse}1{/noparse}-{ noparse }2{ / noparse }", &syntax());
        assert_eq!(table.len(), 2);
        assert_eq!(table.restore(&extracted), "1-2");
    }

    #[test]
    fn test_table_shared_across_texts() {
        let s = syntax();
        let mut table = NoParseTable::new();
        let a = table.extract("{noparse}A{/noparse}", &s);
        let b = table.extract("{noparse}B{/noparse}", &s);
        assert_ne!(a, b);
        assert_eq!(table.restore(&format!("{b}{a}{b}")), "BAB");
    }

    #[test]
    fn test_multiline_region() {
        let mut table = NoParseTable::new();
        let text = "{noparse}\n{item in items}\n{end items}\n{/noparse}";
        let extracted = table.extract(text, &syntax());
        assert_eq!(table.restore(&extracted), "\n{item in items}\n{end items}\n");
    }

    #[test]
    fn test_no_regions_is_identity() {
        let mut table = NoParseTable::new();
        let text = "plain {name}";
        assert_eq!(table.extract(text, &syntax()), text);
        assert!(table.is_empty());
        assert_eq!(table.restore(text), text);
    }

    #[test]
    fn test_custom_delimiters() {
        let s = TagSyntax::new(Delimiters::new("<%", "%>").unwrap()).unwrap();
        let mut table = NoParseTable::new();
        let extracted = table.extract("<% noparse %><% x %><% /noparse %>{noparse}", &s);
        assert_eq!(table.restore(&extracted), "<% x %>{noparse}");
    }
}
