//! Condition expressions.
//!
//! Conditions are parsed into an [`Expr`] tree and evaluated structurally
//! against a [`Context`]; nothing is ever handed to an interpreter.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! or      := and (("||" | "or") and)*
//! and     := compare (("&&" | "and") compare)*
//! compare := unary (("==" | "!=" | "<" | ">" | "<=" | ">=") unary)?
//! unary   := ("!" | "not") unary | primary
//! primary := string | number | "true" | "false" | "null" | path | "(" or ")"
//! ```
//!
//! Comparisons are loose: if either side is a boolean or null both sides are
//! compared by truthiness, numeric-looking values compare as numbers, and
//! anything else compares as text. A path that does not resolve evaluates to
//! `false`.

use std::cmp::Ordering;

use sigil_core::error::{SigilError, SigilResult};

use crate::context::{Context, Value};
use crate::resolver::resolve;

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CmpOp {
    fn apply(self, left: &Value, right: &Value) -> bool {
        match self {
            Self::Eq => loose_eq(left, right),
            Self::Ne => !loose_eq(left, right),
            Self::Lt => loose_cmp(left, right) == Some(Ordering::Less),
            Self::Gt => loose_cmp(left, right) == Some(Ordering::Greater),
            Self::Le => matches!(loose_cmp(left, right), Some(Ordering::Less | Ordering::Equal)),
            Self::Ge => matches!(
                loose_cmp(left, right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

/// A parsed condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal string, number, boolean or null.
    Literal(Value),
    /// A variable path.
    Path(String),
    /// Logical negation.
    Not(Box<Expr>),
    /// A binary comparison.
    Compare(Box<Expr>, CmpOp, Box<Expr>),
    /// Short-circuit AND.
    And(Box<Expr>, Box<Expr>),
    /// Short-circuit OR.
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parses a condition.
    ///
    /// # Errors
    ///
    /// Returns a `TemplateSyntaxError` for malformed input.
    pub fn parse(source: &str) -> SigilResult<Self> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            source,
        };
        let expr = parser.parse_or()?;
        if parser.pos < tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    /// Evaluates this condition against a context.
    pub fn evaluate(&self, ctx: &Context) -> bool {
        self.operand(ctx).is_truthy()
    }

    fn operand(&self, ctx: &Context) -> Value {
        match self {
            Self::Literal(v) => v.clone(),
            Self::Path(path) => resolve(path, ctx).cloned().unwrap_or(Value::Bool(false)),
            Self::Not(inner) => Value::Bool(!inner.evaluate(ctx)),
            Self::Compare(left, op, right) => {
                Value::Bool(op.apply(&left.operand(ctx), &right.operand(ctx)))
            }
            Self::And(left, right) => Value::Bool(left.evaluate(ctx) && right.evaluate(ctx)),
            Self::Or(left, right) => Value::Bool(left.evaluate(ctx) || right.evaluate(ctx)),
        }
    }
}

/// Parses and evaluates a condition in one step.
///
/// # Errors
///
/// Returns a `TemplateSyntaxError` if the condition is malformed.
pub fn evaluate(source: &str, ctx: &Context) -> SigilResult<bool> {
    Ok(Expr::parse(source)?.evaluate(ctx))
}

fn is_loose(v: &Value) -> bool {
    matches!(v, Value::Bool(_) | Value::Null)
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    if is_loose(left) || is_loose(right) {
        return left.is_truthy() == right.is_truthy();
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l.partial_cmp(&r) == Some(Ordering::Equal),
        _ => left.to_display_string() == right.to_display_string(),
    }
}

fn loose_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    if is_loose(left) || is_loose(right) {
        return Some(left.is_truthy().cmp(&right.is_truthy()));
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l.partial_cmp(&r),
        _ => Some(left.to_display_string().cmp(&right.to_display_string())),
    }
}

// ============================================================
// Tokenizer
// ============================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(Value),
    Path(String),
    Not,
    And,
    Or,
    Cmp(CmpOp),
    LParen,
    RParen,
}

fn syntax_error(source: &str, msg: &str) -> SigilError {
    SigilError::TemplateSyntaxError(format!("{msg} in condition '{source}'"))
}

fn tokenize(source: &str) -> SigilResult<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Eq));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Ne));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' | '>' => {
                let or_equal = next == Some('=');
                tokens.push(Token::Cmp(match (c, or_equal) {
                    ('<', true) => CmpOp::Le,
                    ('<', false) => CmpOp::Lt,
                    (_, true) => CmpOp::Ge,
                    (_, false) => CmpOp::Gt,
                }));
                i += if or_equal { 2 } else { 1 };
            }
            '"' | '\'' => {
                let (text, end) = read_string(&chars, i, source)?;
                tokens.push(Token::Literal(Value::String(text)));
                i = end;
            }
            c if c.is_ascii_digit()
                || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) =>
            {
                let (value, end) = read_number(&chars, i, source)?;
                tokens.push(Token::Literal(value));
                i = end;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let (word, end) = read_path(&chars, i);
                tokens.push(match word.as_str() {
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "null" => Token::Literal(Value::Null),
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Path(word),
                });
                i = end;
            }
            other => {
                return Err(syntax_error(source, &format!("unexpected character '{other}'")));
            }
        }
    }

    Ok(tokens)
}

fn read_string(chars: &[char], start: usize, source: &str) -> SigilResult<(String, usize)> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                text.push(chars[i + 1]);
                i += 2;
            }
            c if c == quote => return Ok((text, i + 1)),
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    Err(syntax_error(source, "unterminated string literal"))
}

fn read_number(chars: &[char], start: usize, source: &str) -> SigilResult<(Value, usize)> {
    let mut i = start + 1;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
        i += 1;
    }
    let text: String = chars[start..i].iter().collect();
    if let Ok(n) = text.parse::<i64>() {
        return Ok((Value::Integer(n), i));
    }
    text.parse::<f64>()
        .map(|f| (Value::Float(f), i))
        .map_err(|_| syntax_error(source, &format!("invalid number '{text}'")))
}

/// Reads an identifier with `.segment` / `->segment` suffixes.
fn read_path(chars: &[char], start: usize) -> (String, usize) {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut i = start;
    while i < chars.len() && is_word(chars[i]) {
        i += 1;
    }
    loop {
        let sep = match (chars.get(i), chars.get(i + 1)) {
            (Some('.'), _) => 1,
            (Some('-'), Some('>')) => 2,
            _ => break,
        };
        if !chars.get(i + sep).is_some_and(|&c| is_word(c)) {
            break;
        }
        i += sep;
        while i < chars.len() && is_word(chars[i]) {
            i += 1;
        }
    }
    (chars[start..i].iter().collect(), i)
}

// ============================================================
// Parser
// ============================================================

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, msg: &str) -> SigilError {
        syntax_error(self.source, msg)
    }

    fn parse_or(&mut self) -> SigilResult<Expr> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> SigilResult<Expr> {
        let mut left = self.parse_compare()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_compare()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_compare(&mut self) -> SigilResult<Expr> {
        let left = self.parse_unary()?;
        let Some(&Token::Cmp(op)) = self.peek() else {
            return Ok(left);
        };
        self.pos += 1;
        let right = self.parse_unary()?;
        if matches!(self.peek(), Some(Token::Cmp(_))) {
            return Err(self.error("chained comparison"));
        }
        Ok(Expr::Compare(Box::new(left), op, Box::new(right)))
    }

    fn parse_unary(&mut self) -> SigilResult<Expr> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> SigilResult<Expr> {
        match self.advance().cloned() {
            Some(Token::Literal(v)) => Ok(Expr::Literal(v)),
            Some(Token::Path(p)) => Ok(Expr::Path(p)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("missing ')'")),
                }
            }
            Some(other) => Err(self.error(&format!("unexpected token {other:?}"))),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::from_json(
            r#"{
                "age": 20,
                "price": "9.50",
                "name": "ana",
                "zero": "0",
                "empty": "",
                "flag": true,
                "off": false,
                "nothing": null,
                "user": { "role": "admin", "score": 7 },
                "rows": [1, 2]
            }"#,
        )
        .unwrap()
    }

    fn eval(src: &str) -> bool {
        evaluate(src, &ctx()).unwrap()
    }

    #[test]
    fn test_numeric_comparisons() {
        assert!(eval("age > 17"));
        assert!(!eval("age < 17"));
        assert!(eval("age >= 20"));
        assert!(eval("age <= 20.0"));
        assert!(eval("price < 10"));
        assert!(eval("price == 9.5"));
        assert!(eval("user.score != 8"));
        assert!(eval("-1 < 0"));
    }

    #[test]
    fn test_string_comparisons() {
        assert!(eval("name == \"ana\""));
        assert!(eval("name == 'ana'"));
        assert!(eval("user->role != 'guest'"));
        assert!(eval("name < 'bob'"));
        assert!(eval("'it\\'s' == \"it's\""));
        // "10" and "9" compare numerically, not lexically.
        assert!(eval("'10' > '9'"));
    }

    #[test]
    fn test_boolean_logic_and_precedence() {
        assert!(eval("age > 17 && name == 'ana'"));
        assert!(eval("age < 17 || flag"));
        assert!(eval("off || flag && age == 20"));
        assert!(!eval("(off || flag) && age == 21"));
        assert!(eval("age > 17 and not off"));
        assert!(eval("!off"));
        assert!(eval("!!flag"));
        assert!(!eval("!age > 17"));
    }

    #[test]
    fn test_truthiness() {
        assert!(eval("flag"));
        assert!(!eval("zero"));
        assert!(!eval("empty"));
        assert!(!eval("nothing"));
        assert!(eval("rows"));
        assert!(eval("user"));
        assert!(eval("age"));
    }

    #[test]
    fn test_missing_path_is_false() {
        assert!(!eval("missing"));
        assert!(eval("!missing"));
        assert!(eval("missing == false"));
        assert!(!eval("missing.deep == 'x'"));
    }

    #[test]
    fn test_bool_and_null_compare_by_truthiness() {
        assert!(eval("flag == 1"));
        assert!(eval("flag == 'yes'"));
        assert!(eval("off == 0"));
        assert!(eval("nothing == ''"));
        assert!(eval("nothing == null"));
        assert!(!eval("nothing == 'x'"));
        assert!(eval("true > false"));
    }

    #[test]
    fn test_short_circuit_does_not_evaluate_rhs() {
        // The right-hand side resolves nothing either way; the point is that
        // evaluation returns without touching it.
        assert!(eval("flag || missing.a.b.c"));
        assert!(!eval("off && missing"));
    }

    #[test]
    fn test_parse_tree_shape() {
        let expr = Expr::parse("a || b && !c == 1").unwrap();
        let expected = Expr::Or(
            Box::new(Expr::Path("a".into())),
            Box::new(Expr::And(
                Box::new(Expr::Path("b".into())),
                Box::new(Expr::Compare(
                    Box::new(Expr::Not(Box::new(Expr::Path("c".into())))),
                    CmpOp::Eq,
                    Box::new(Expr::Literal(Value::Integer(1))),
                )),
            )),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_parse_paths_and_literals() {
        assert_eq!(
            Expr::parse("user->role").unwrap(),
            Expr::Path("user->role".into())
        );
        assert_eq!(
            Expr::parse("2.5").unwrap(),
            Expr::Literal(Value::Float(2.5))
        );
        assert_eq!(Expr::parse("null").unwrap(), Expr::Literal(Value::Null));
    }

    #[test]
    fn test_malformed_expressions() {
        for src in [
            "",
            "age >",
            "(age > 1",
            "age > 1)",
            "a < b < c",
            "'open",
            "age = 1",
            "age & 1",
            "system('rm -rf /')",
            "1.2.3 > 0",
            "a b",
        ] {
            let result = Expr::parse(src);
            assert!(
                matches!(result, Err(SigilError::TemplateSyntaxError(_))),
                "expected parse error for {src:?}, got {result:?}"
            );
        }
    }
}
