//! Template inheritance.
//!
//! A template that contains `{extends: base}` has its
//! `{block name}...{endblock}` definitions recorded and removed; the base is
//! then composed with those definitions as overrides, and the composed base
//! replaces the `extends` tag in place.
//!
//! ## Example
//!
//! ```text
//! base.html:  <main>{block content}Default{endblock}</main>
//! page.html:  {extends: base}{block content}Hello{endblock}
//! ```
//!
//! Rendering `page.html` produces `<main>Hello</main>`.
//!
//! Overrides from more-derived templates win; within one template the first
//! definition of a name wins. A block that appears inside its own content
//! renders as empty.

use std::collections::HashMap;
use std::ops::Range;

use tracing::warn;

use crate::lexer::{find_closing, find_tags, TagMatch, TagPair, TagSyntax};

/// Block name to block source.
pub type Blocks = HashMap<String, String>;

/// A top-level `{block}...{endblock}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BlockSpan {
    name: String,
    /// The whole block, tags included.
    outer: Range<usize>,
    /// The content between the tags.
    body: Range<usize>,
}

/// Returns the first `extends` tag in `text`, if any.
pub fn find_extends(text: &str, syntax: &TagSyntax) -> Option<TagMatch> {
    find_tags(&syntax.extends, text).into_iter().next()
}

fn top_level_blocks(text: &str, syntax: &TagSyntax) -> Vec<BlockSpan> {
    let pair = TagPair {
        open: &syntax.block_open,
        open_key: 1,
        close: &syntax.block_close,
        close_key: 0,
    };

    let mut blocks = Vec::new();
    let mut cursor = 0;
    for open in find_tags(&syntax.block_open, text) {
        if open.span.start < cursor {
            continue;
        }
        let Some(close) = find_closing(text, open.span.end, pair, None) else {
            warn!(block = open.group(1), "Unterminated block left in place");
            continue;
        };
        cursor = close.end;
        blocks.push(BlockSpan {
            name: open.group(1).to_string(),
            outer: open.span.start..close.end,
            body: open.span.end..close.start,
        });
    }
    blocks
}

/// Records every block definition in `text`, nested ones included.
///
/// Names already present in `blocks` are kept, so callers seed the map with
/// the more-derived definitions first.
pub fn collect_blocks(text: &str, syntax: &TagSyntax, blocks: &mut Blocks) {
    for block in top_level_blocks(text, syntax) {
        let body = &text[block.body.clone()];
        blocks
            .entry(block.name)
            .or_insert_with(|| body.to_string());
        collect_blocks(body, syntax, blocks);
    }
}

/// Removes every top-level block definition from `text`.
pub fn strip_blocks(text: &str, syntax: &TagSyntax) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for block in top_level_blocks(text, syntax) {
        out.push_str(&text[cursor..block.outer.start]);
        cursor = block.outer.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Replaces every block in `text` with its override or its own content.
///
/// `active` holds the names of the blocks currently being resolved; a block
/// found inside itself renders as empty.
pub fn resolve_blocks(
    text: &str,
    overrides: &Blocks,
    syntax: &TagSyntax,
    active: &mut Vec<String>,
) -> String {
    let blocks = top_level_blocks(text, syntax);
    if blocks.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for block in blocks {
        out.push_str(&text[cursor..block.outer.start]);
        cursor = block.outer.end;

        if active.contains(&block.name) {
            warn!(block = %block.name, "Block re-enters itself; rendering empty");
            continue;
        }
        let content = overrides
            .get(&block.name)
            .map_or(&text[block.body.clone()], String::as_str);

        active.push(block.name);
        out.push_str(&resolve_blocks(content, overrides, syntax, active));
        active.pop();
    }
    out.push_str(&text[cursor..]);
    out
}
