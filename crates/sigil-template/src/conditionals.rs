//! Conditional blocks.
//!
//! `{if cond}...{elseif cond}...{else}...{endif}` blocks are found with a
//! depth-aware scan, so an inner `if ... endif` pair inside a branch is
//! skipped as a unit. Exactly one branch body (or nothing) survives, and only
//! that body is processed further.

use tracing::warn;

use crate::context::Context;
use crate::expression::Expr;
use crate::lexer::{find_tags, TagMatch, TagSyntax};

/// One arm of a conditional: its condition (`None` for `else`) and body span.
struct Branch<'t> {
    condition: Option<&'t str>,
    body: &'t str,
}

/// Resolves every conditional block in `text` against `ctx`.
///
/// Malformed conditions select the `else` branch (or nothing). Stray
/// `elseif`/`else`/`endif` tags and unterminated `if` tags are left verbatim.
pub fn process_conditionals(text: &str, ctx: &Context, syntax: &TagSyntax) -> String {
    let tags = find_tags(&syntax.conditional, text);
    if tags.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut idx = 0;

    while idx < tags.len() {
        let head = &tags[idx];
        if head.group(1) != "if" {
            warn!(tag = %&text[head.span.clone()], "Stray conditional tag left in place");
            idx += 1;
            continue;
        }

        let Some((branches, end_idx)) = collect_branches(text, &tags, idx) else {
            warn!(tag = %&text[head.span.clone()], "Unterminated if block left in place");
            idx += 1;
            continue;
        };

        out.push_str(&text[cursor..head.span.start]);
        if let Some(body) = select_branch(&branches, ctx) {
            out.push_str(&process_conditionals(body, ctx, syntax));
        }
        cursor = tags[end_idx].span.end;
        idx = end_idx + 1;
    }

    out.push_str(&text[cursor..]);
    out
}

/// Splits the block opened at `tags[start]` into branches.
///
/// Returns the branches and the index of the balancing `endif`.
fn collect_branches<'t>(
    text: &'t str,
    tags: &'t [TagMatch],
    start: usize,
) -> Option<(Vec<Branch<'t>>, usize)> {
    let mut branches = Vec::new();
    let mut condition = Some(tags[start].group(2));
    let mut body_start = tags[start].span.end;
    let mut depth = 0usize;

    for (offset, tag) in tags.iter().enumerate().skip(start + 1) {
        match (tag.group(1), depth) {
            ("if", _) => depth += 1,
            ("endif", 0) => {
                branches.push(Branch {
                    condition,
                    body: &text[body_start..tag.span.start],
                });
                return Some((branches, offset));
            }
            ("endif", _) => depth -= 1,
            (kind @ ("elseif" | "else"), 0) => {
                branches.push(Branch {
                    condition,
                    body: &text[body_start..tag.span.start],
                });
                condition = (kind == "elseif").then(|| tag.group(2));
                body_start = tag.span.end;
            }
            _ => {}
        }
    }
    None
}

/// Picks the first branch whose condition holds.
///
/// A condition that fails to parse abandons the remaining conditions and
/// falls back to the `else` body.
fn select_branch<'t>(branches: &[Branch<'t>], ctx: &Context) -> Option<&'t str> {
    for branch in branches {
        let Some(condition) = branch.condition else {
            return Some(branch.body);
        };
        match Expr::parse(condition) {
            Ok(expr) if expr.evaluate(ctx) => return Some(branch.body),
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Malformed condition; using else branch");
                return branches
                    .iter()
                    .find(|b| b.condition.is_none())
                    .map(|b| b.body);
            }
        }
    }
    None
}
