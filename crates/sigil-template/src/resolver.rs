//! Variable resolution and flat substitution.
//!
//! Paths are split on `.` or `->`, which are interchangeable separators:
//! `user.address.city` and `user->address->city` name the same value.
//! Numeric segments index into lists (`rows.0.label`).

use regex::Captures;
use tracing::trace;

use crate::context::{Context, Value};
use crate::filters::{parse_chain, FilterRegistry};
use crate::lexer::TagSyntax;

/// Tag words owned by other constructs; never treated as variables.
const RESERVED: &[&str] = &[
    "if", "elseif", "else", "endif", "end", "block", "endblock", "noparse",
];

/// Splits a path into its segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split("->").flat_map(|part| part.split('.'))
}

/// Resolves a dotted path against a context.
///
/// Returns `None` as soon as any segment is missing; never mutates `ctx`.
pub fn resolve<'a>(path: &str, ctx: &'a Context) -> Option<&'a Value> {
    let mut parts = segments(path);
    let mut current = ctx.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(inner) => inner.get(part)?,
            Value::List(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Settings for one substitution pass.
#[derive(Debug, Clone, Copy)]
pub struct Substitution<'a> {
    pub syntax: &'a TagSyntax,
    pub filters: &'a FilterRegistry,
    /// Replace tags whose path does not resolve with the empty string.
    pub clear_unresolved: bool,
}

impl Substitution<'_> {
    /// Replaces every variable tag in `text` that resolves against `ctx`.
    ///
    /// A tag is replaced when its value, after the optional filter chain, is a
    /// scalar. Tags naming a list or object without a scalar-producing chain
    /// are left in place, as are unresolved tags unless `clear_unresolved` is set.
    pub fn apply(&self, text: &str, ctx: &Context) -> String {
        self.syntax
            .variable
            .replace_all(text, |caps: &Captures<'_>| {
                let path = caps.get(1).map_or("", |m| m.as_str());
                let chain = caps.get(2).map(|m| m.as_str()).filter(|c| !c.trim().is_empty());
                self.render_tag(path, chain, ctx)
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    fn render_tag(&self, path: &str, chain: Option<&str>, ctx: &Context) -> Option<String> {
        if RESERVED.contains(&path) {
            return None;
        }

        let Some(value) = resolve(path, ctx) else {
            if !self.clear_unresolved {
                trace!(path, "Unresolved variable left in place");
                return None;
            }
            // With clearing on, the chain still runs so `default` can supply a fallback.
            let out = chain.map_or(Value::Null, |c| {
                self.filters.apply_chain(Value::Null, &parse_chain(c))
            });
            return Some(out.to_display_string());
        };

        match chain {
            None => value.is_scalar().then(|| value.to_display_string()),
            Some(chain) => {
                let out = self.filters.apply_chain(value.clone(), &parse_chain(chain));
                out.is_scalar().then(|| out.to_display_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Delimiters;

    fn ctx() -> Context {
        Context::from_json(
            r#"{
                "name": "ana",
                "age": 20,
                "none": null,
                "user": { "address": { "city": "Lisbon" }, "tags": ["x", "y"] },
                "items": [{ "label": "a" }, { "label": "b" }]
            }"#,
        )
        .unwrap()
    }

    fn substitute(text: &str, ctx: &Context, clear: bool) -> String {
        let syntax = TagSyntax::new(Delimiters::default()).unwrap();
        let filters = FilterRegistry::with_builtins();
        Substitution {
            syntax: &syntax,
            filters: &filters,
            clear_unresolved: clear,
        }
        .apply(text, ctx)
    }

    // ── resolve ─────────────────────────────────────────────────────

    #[test]
    fn test_resolve_top_level() {
        let c = ctx();
        assert_eq!(resolve("name", &c), Some(&Value::from("ana")));
        assert_eq!(resolve("none", &c), Some(&Value::Null));
        assert_eq!(resolve("missing", &c), None);
    }

    #[test]
    fn test_resolve_separators_equivalent() {
        let c = ctx();
        let city = Some(&Value::from("Lisbon"));
        assert_eq!(resolve("user.address.city", &c), city);
        assert_eq!(resolve("user->address->city", &c), city);
        assert_eq!(resolve("user->address.city", &c), city);
    }

    #[test]
    fn test_resolve_list_index() {
        let c = ctx();
        assert_eq!(resolve("items.1.label", &c), Some(&Value::from("b")));
        assert_eq!(resolve("user.tags.0", &c), Some(&Value::from("x")));
        assert_eq!(resolve("items.5.label", &c), None);
        assert_eq!(resolve("items.x", &c), None);
    }

    #[test]
    fn test_resolve_missing_at_depth() {
        let c = ctx();
        assert_eq!(resolve("user.address.zip", &c), None);
        assert_eq!(resolve("name.first", &c), None);
        assert_eq!(resolve("", &c), None);
    }

    // ── substitution ────────────────────────────────────────────────

    #[test]
    fn test_substitute_scalar() {
        assert_eq!(substitute("Hi {name}, {age}!", &ctx(), false), "Hi ana, 20!");
        assert_eq!(substitute("[{none}]", &ctx(), false), "[]");
    }

    #[test]
    fn test_substitute_nested_paths() {
        assert_eq!(
            substitute("{user.address.city}/{user->address->city}", &ctx(), false),
            "Lisbon/Lisbon"
        );
    }

    #[test]
    fn test_substitute_with_filters() {
        assert_eq!(substitute("Hello {name|upper}!", &ctx(), false), "Hello ANA!");
        assert_eq!(substitute("{ name | upper | reverse }", &ctx(), false), "ANA");
        assert_eq!(substitute("{name|limit_chars:2}", &ctx(), false), "an");
    }

    #[test]
    fn test_substitute_composite_left_unless_scalar_chain() {
        assert_eq!(substitute("{items}", &ctx(), false), "{items}");
        assert_eq!(substitute("{items|length}", &ctx(), false), "2");
        assert_eq!(substitute("{items|reverse}", &ctx(), false), "{items|reverse}");
    }

    #[test]
    fn test_substitute_unresolved_left_in_place() {
        assert_eq!(substitute("a {missing} b", &ctx(), false), "a {missing} b");
        assert_eq!(substitute("{missing|upper}", &ctx(), false), "{missing|upper}");
    }

    #[test]
    fn test_substitute_clear_unresolved() {
        assert_eq!(substitute("a {missing} b", &ctx(), true), "a  b");
        assert_eq!(substitute("{missing|default:N/A}", &ctx(), true), "N/A");
        // Reserved words belong to other constructs.
        assert_eq!(substitute("{else}{endif}", &ctx(), true), "{else}{endif}");
    }

    #[test]
    fn test_substitute_reserved_even_when_present() {
        let c = Context::new().with("else", "boom");
        assert_eq!(substitute("{else}", &c, false), "{else}");
    }

    #[test]
    fn test_substitute_ignores_non_variable_tags() {
        let text = "{if age > 1}x{endif} {item in items} body { color: red }";
        assert_eq!(substitute(text, &ctx(), true), text);
    }

    #[test]
    fn test_substitute_does_not_mutate_context() {
        let c = ctx();
        let before = c.clone();
        let _ = substitute("{name|upper}", &c, true);
        assert_eq!(c, before);
    }
}
