//! Loop blocks.
//!
//! Two forms are accepted:
//!
//! - bound: `{row in rows}...{end rows}` exposes each row as `row`, with
//!   `row.index` (from 0) and `row.i` (from 1) alongside the row's fields;
//! - legacy: `{rows}...{/rows}` exposes `index`, `i` and the row's fields at
//!   the top level of the iteration context.
//!
//! In both forms row fields win over `index`/`i`, rows that are not objects
//! are exposed as `value`, and the enclosing context stays visible. Every
//! top-level loop in the text is expanded in one call.

use std::collections::HashSet;
use std::ops::Range;

use tracing::debug;

use crate::context::{Context, Value};
use crate::lexer::{find_closing, find_tags, TagPair, TagSyntax};
use crate::resolver::resolve;

/// Renders a loop body once it has been bound to an iteration context.
///
/// Nested loops are expanded before this is called.
pub type BodyRenderer<'a> = dyn Fn(&str, &Context) -> String + 'a;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Form {
    Bound(String),
    Legacy,
}

#[derive(Debug)]
struct Opening {
    span: Range<usize>,
    path: String,
    form: Form,
}

fn openings(text: &str, syntax: &TagSyntax) -> Vec<Opening> {
    let legacy_closed: HashSet<String> = find_tags(&syntax.legacy_close, text)
        .into_iter()
        .map(|t| t.group(1).to_string())
        .collect();

    let bound = find_tags(&syntax.loop_open, text).into_iter().map(|t| Opening {
        path: t.group(2).to_string(),
        form: Form::Bound(t.group(1).to_string()),
        span: t.span,
    });
    let legacy = find_tags(&syntax.legacy_open, text)
        .into_iter()
        .filter(|t| legacy_closed.contains(t.group(1)))
        .map(|t| Opening {
            path: t.group(1).to_string(),
            form: Form::Legacy,
            span: t.span,
        });

    let mut all: Vec<Opening> = bound.chain(legacy).collect();
    all.sort_by_key(|o| o.span.start);
    all
}

/// Expands every loop in `text` against `ctx`.
///
/// Each iteration first expands loops nested in the body, then hands the
/// result to `render_body` with the iteration context. An opening tag with no
/// balancing close is not a loop and is left in place.
pub fn expand_loops(
    text: &str,
    ctx: &Context,
    syntax: &TagSyntax,
    render_body: &BodyRenderer<'_>,
) -> String {
    let candidates = openings(text, syntax);
    if candidates.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for open in candidates {
        if open.span.start < cursor {
            continue;
        }
        let pair = match open.form {
            Form::Bound(_) => TagPair {
                open: &syntax.loop_open,
                open_key: 2,
                close: &syntax.loop_close,
                close_key: 1,
            },
            Form::Legacy => TagPair {
                open: &syntax.legacy_open,
                open_key: 1,
                close: &syntax.legacy_close,
                close_key: 1,
            },
        };
        let Some(close) = find_closing(text, open.span.end, pair, Some(&open.path)) else {
            continue;
        };

        out.push_str(&text[cursor..open.span.start]);
        let body = &text[open.span.end..close.start];
        out.push_str(&render_loop(&open, body, ctx, syntax, render_body));
        cursor = close.end;
    }

    out.push_str(&text[cursor..]);
    out
}

fn render_loop(
    open: &Opening,
    body: &str,
    ctx: &Context,
    syntax: &TagSyntax,
    render_body: &BodyRenderer<'_>,
) -> String {
    let Some(Value::List(rows)) = resolve(&open.path, ctx) else {
        debug!(path = %open.path, "Loop path is not a list; rendering nothing");
        return String::new();
    };

    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let iteration = iteration_context(&open.form, ctx, index, row);
            let expanded = expand_loops(body, &iteration, syntax, render_body);
            render_body(&expanded, &iteration)
        })
        .collect()
}

fn iteration_context(form: &Form, outer: &Context, index: usize, row: &Value) -> Context {
    let index = i64::try_from(index).unwrap_or(i64::MAX);
    let mut bindings = Context::new()
        .with("index", index)
        .with("i", index.saturating_add(1));
    match row {
        Value::Object(fields) => bindings.extend_from(fields),
        other => bindings.set("value", other.clone()),
    }

    match form {
        Form::Bound(ident) => outer.clone().with(ident.as_str(), bindings),
        Form::Legacy => outer.merged(&bindings),
    }
}
