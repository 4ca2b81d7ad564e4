// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restricted expression grammar for declarative guards and triggering
//! rules.
//!
//! Expressions are compiled once into a small AST and interpreted over an
//! `(event payload, instance view)` scope. The grammar covers property
//! paths, the comparison operators `=== !== > < >= <= contains in`,
//! boolean combinators (`&& || !`, also spelled `AND OR NOT`), grouping
//! parentheses, and literals. There is deliberately no scripting engine
//! behind this: evaluation is pure and total (missing paths resolve to
//! `null`, comparisons over mismatched types are false).

use crate::path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Expression compilation errors, with byte offsets into the source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("unterminated string literal at offset {0}")]
    UnterminatedString(usize),
    #[error("unexpected character {ch:?} at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unexpected token {found:?} at offset {pos}")]
    UnexpectedToken { found: String, pos: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("trailing input at offset {0}")]
    Trailing(usize),
    #[error("invalid number at offset {0}")]
    InvalidNumber(usize),
    #[error("expression is empty")]
    Empty,
}

/// Comparison operators shared by expressions and matching rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompareOp {
    #[default]
    #[serde(rename = "===")]
    Eq,
    #[serde(rename = "!==")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "in")]
    In,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "===",
            CompareOp::Ne => "!==",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Contains => "contains",
            CompareOp::In => "in",
        }
    }

    /// Parse an operator from its textual form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "===" => Some(CompareOp::Eq),
            "!==" => Some(CompareOp::Ne),
            ">" => Some(CompareOp::Gt),
            "<" => Some(CompareOp::Lt),
            ">=" => Some(CompareOp::Ge),
            "<=" => Some(CompareOp::Le),
            "contains" => Some(CompareOp::Contains),
            "in" => Some(CompareOp::In),
            _ => None,
        }
    }

    /// Apply the operator to two dynamic values.
    ///
    /// Numbers compare numerically, strings lexicographically; any other
    /// ordering comparison is false. `contains` covers substring and
    /// array membership; `in` is its mirror image.
    pub fn apply(&self, lhs: &Value, rhs: &Value) -> bool {
        match self {
            CompareOp::Eq => value_eq(lhs, rhs),
            CompareOp::Ne => !value_eq(lhs, rhs),
            CompareOp::Gt => value_cmp(lhs, rhs).map(|o| o.is_gt()).unwrap_or(false),
            CompareOp::Lt => value_cmp(lhs, rhs).map(|o| o.is_lt()).unwrap_or(false),
            CompareOp::Ge => value_cmp(lhs, rhs).map(|o| o.is_ge()).unwrap_or(false),
            CompareOp::Le => value_cmp(lhs, rhs).map(|o| o.is_le()).unwrap_or(false),
            CompareOp::Contains => value_contains(lhs, rhs),
            CompareOp::In => value_contains(rhs, lhs),
        }
    }
}

/// Equality with numeric coercion (`5` equals `5.0`).
pub fn value_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

fn value_cmp(lhs: &Value, rhs: &Value) -> Option<std::cmp::Ordering> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    }
}

fn value_contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => match needle {
            Value::String(n) => s.contains(n.as_str()),
            other => s.contains(&other.to_string()),
        },
        Value::Array(items) => items.iter().any(|item| value_eq(item, needle)),
        _ => false,
    }
}

/// Truthiness of a dynamic value: `null` and absent are false, booleans
/// are themselves, numbers are non-zero, strings are non-empty, objects
/// and arrays are true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Object(_) | Value::Array(_) => true,
    }
}

/// Evaluation scope: the event payload and the instance's business view.
#[derive(Debug, Clone, Copy)]
pub struct EvalScope<'a> {
    pub event: &'a Value,
    pub context: &'a Value,
}

impl<'a> EvalScope<'a> {
    pub fn new(event: &'a Value, context: &'a Value) -> Self {
        Self { event, context }
    }

    /// Resolve a property path under the scope's root rules: `event.`
    /// reads the event payload, `context.` / `instance.` read the
    /// instance view, and bare paths read the event payload.
    pub fn resolve(&self, full_path: &str) -> Value {
        let (root, rest) = match full_path.split_once('.') {
            Some(("event", rest)) => (self.event, rest),
            Some(("context" | "instance", rest)) => (self.context, rest),
            _ => match full_path {
                "event" => return self.event.clone(),
                "context" | "instance" => return self.context.clone(),
                _ => (self.event, full_path),
            },
        };
        path::resolve_or_null(root, rest)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ExprNode {
    Literal(Value),
    Path(String),
    Not(Box<ExprNode>),
    And(Box<ExprNode>, Box<ExprNode>),
    Or(Box<ExprNode>, Box<ExprNode>),
    Compare {
        op: CompareOp,
        lhs: Box<ExprNode>,
        rhs: Box<ExprNode>,
    },
}

impl ExprNode {
    fn eval(&self, scope: &EvalScope<'_>) -> Value {
        match self {
            ExprNode::Literal(v) => v.clone(),
            ExprNode::Path(p) => scope.resolve(p),
            ExprNode::Not(inner) => Value::Bool(!truthy(&inner.eval(scope))),
            ExprNode::And(a, b) => {
                Value::Bool(truthy(&a.eval(scope)) && truthy(&b.eval(scope)))
            }
            ExprNode::Or(a, b) => {
                Value::Bool(truthy(&a.eval(scope)) || truthy(&b.eval(scope)))
            }
            ExprNode::Compare { op, lhs, rhs } => {
                Value::Bool(op.apply(&lhs.eval(scope), &rhs.eval(scope)))
            }
        }
    }
}

/// A compiled expression: the original source plus its AST.
///
/// Serializes as the source string; deserialization re-compiles and
/// rejects invalid grammar at document-load time.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    node: ExprNode,
}

impl Expression {
    /// Compile an expression from source.
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let tokens = lex(source)?;
        if tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let node = parser.parse_or()?;
        if let Some((_, pos)) = parser.peek() {
            return Err(ExprError::Trailing(pos));
        }
        Ok(Self {
            source: source.to_string(),
            node,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate to a dynamic value.
    pub fn eval(&self, scope: &EvalScope<'_>) -> Value {
        self.node.eval(scope)
    }

    /// Evaluate to a boolean via truthiness.
    pub fn eval_bool(&self, scope: &EvalScope<'_>) -> bool {
        truthy(&self.eval(scope))
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Expression {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Expression::parse(&source).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Num(f64),
    Ident(String),
    EqEq,
    NotEq,
    Gt,
    Lt,
    Ge,
    Le,
    AndAnd,
    OrOr,
    Bang,
    LParen,
    RParen,
}

fn lex(source: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut i = 0;
    while i < chars.len() {
        let (pos, ch) = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push((Token::LParen, pos));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, pos));
                i += 1;
            }
            '\'' | '"' => {
                let quote = ch;
                let mut out = String::new();
                let mut j = i + 1;
                let mut closed = false;
                while j < chars.len() {
                    let (_, c) = chars[j];
                    if c == '\\' && j + 1 < chars.len() {
                        out.push(chars[j + 1].1);
                        j += 2;
                        continue;
                    }
                    if c == quote {
                        closed = true;
                        break;
                    }
                    out.push(c);
                    j += 1;
                }
                if !closed {
                    return Err(ExprError::UnterminatedString(pos));
                }
                tokens.push((Token::Str(out), pos));
                i = j + 1;
            }
            '=' => {
                if matches!(chars.get(i + 1), Some((_, '=')))
                    && matches!(chars.get(i + 2), Some((_, '=')))
                {
                    tokens.push((Token::EqEq, pos));
                    i += 3;
                } else {
                    return Err(ExprError::UnexpectedChar { ch, pos });
                }
            }
            '!' => {
                if matches!(chars.get(i + 1), Some((_, '=')))
                    && matches!(chars.get(i + 2), Some((_, '=')))
                {
                    tokens.push((Token::NotEq, pos));
                    i += 3;
                } else {
                    tokens.push((Token::Bang, pos));
                    i += 1;
                }
            }
            '>' => {
                if matches!(chars.get(i + 1), Some((_, '='))) {
                    tokens.push((Token::Ge, pos));
                    i += 2;
                } else {
                    tokens.push((Token::Gt, pos));
                    i += 1;
                }
            }
            '<' => {
                if matches!(chars.get(i + 1), Some((_, '='))) {
                    tokens.push((Token::Le, pos));
                    i += 2;
                } else {
                    tokens.push((Token::Lt, pos));
                    i += 1;
                }
            }
            '&' => {
                if matches!(chars.get(i + 1), Some((_, '&'))) {
                    tokens.push((Token::AndAnd, pos));
                    i += 2;
                } else {
                    return Err(ExprError::UnexpectedChar { ch, pos });
                }
            }
            '|' => {
                if matches!(chars.get(i + 1), Some((_, '|'))) {
                    tokens.push((Token::OrOr, pos));
                    i += 2;
                } else {
                    return Err(ExprError::UnexpectedChar { ch, pos });
                }
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut j = i;
                if c == '-' {
                    j += 1;
                }
                let start = j;
                while j < chars.len() && (chars[j].1.is_ascii_digit() || chars[j].1 == '.') {
                    j += 1;
                }
                if start == j {
                    return Err(ExprError::InvalidNumber(pos));
                }
                let text: String = chars[i..j].iter().map(|(_, c)| *c).collect();
                let num: f64 = text.parse().map_err(|_| ExprError::InvalidNumber(pos))?;
                tokens.push((Token::Num(num), pos));
                i = j;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut j = i;
                while j < chars.len()
                    && (chars[j].1.is_ascii_alphanumeric()
                        || chars[j].1 == '_'
                        || chars[j].1 == '.')
                {
                    j += 1;
                }
                let text: String = chars[i..j].iter().map(|(_, c)| *c).collect();
                tokens.push((Token::Ident(text), pos));
                i = j;
            }
            _ => return Err(ExprError::UnexpectedChar { ch, pos }),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<(&Token, usize)> {
        self.tokens.get(self.pos).map(|(t, p)| (t, *p))
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_or(&mut self) -> Result<ExprNode, ExprError> {
        let mut node = self.parse_and()?;
        loop {
            match self.peek() {
                Some((Token::OrOr, _)) => {
                    self.pos += 1;
                }
                Some((Token::Ident(kw), _)) if kw.eq_ignore_ascii_case("or") => {
                    self.pos += 1;
                }
                _ => break,
            }
            let rhs = self.parse_and()?;
            node = ExprNode::Or(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn parse_and(&mut self) -> Result<ExprNode, ExprError> {
        let mut node = self.parse_comparison()?;
        loop {
            match self.peek() {
                Some((Token::AndAnd, _)) => {
                    self.pos += 1;
                }
                Some((Token::Ident(kw), _)) if kw.eq_ignore_ascii_case("and") => {
                    self.pos += 1;
                }
                _ => break,
            }
            let rhs = self.parse_comparison()?;
            node = ExprNode::And(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn parse_comparison(&mut self) -> Result<ExprNode, ExprError> {
        let lhs = self.parse_unary()?;
        let op = match self.peek() {
            Some((Token::EqEq, _)) => Some(CompareOp::Eq),
            Some((Token::NotEq, _)) => Some(CompareOp::Ne),
            Some((Token::Gt, _)) => Some(CompareOp::Gt),
            Some((Token::Lt, _)) => Some(CompareOp::Lt),
            Some((Token::Ge, _)) => Some(CompareOp::Ge),
            Some((Token::Le, _)) => Some(CompareOp::Le),
            Some((Token::Ident(kw), _)) if kw == "contains" => Some(CompareOp::Contains),
            Some((Token::Ident(kw), _)) if kw == "in" => Some(CompareOp::In),
            _ => None,
        };
        match op {
            Some(op) => {
                self.pos += 1;
                let rhs = self.parse_unary()?;
                Ok(ExprNode::Compare {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                })
            }
            None => Ok(lhs),
        }
    }

    fn parse_unary(&mut self) -> Result<ExprNode, ExprError> {
        match self.peek() {
            Some((Token::Bang, _)) => {
                self.pos += 1;
                Ok(ExprNode::Not(Box::new(self.parse_unary()?)))
            }
            Some((Token::Ident(kw), _)) if kw.eq_ignore_ascii_case("not") => {
                self.pos += 1;
                Ok(ExprNode::Not(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<ExprNode, ExprError> {
        let Some((token, pos)) = self.next() else {
            return Err(ExprError::UnexpectedEnd);
        };
        match token {
            Token::Str(s) => Ok(ExprNode::Literal(Value::String(s))),
            Token::Num(n) => Ok(ExprNode::Literal(
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            )),
            Token::Ident(word) => match word.as_str() {
                "true" => Ok(ExprNode::Literal(Value::Bool(true))),
                "false" => Ok(ExprNode::Literal(Value::Bool(false))),
                "null" => Ok(ExprNode::Literal(Value::Null)),
                _ => Ok(ExprNode::Path(word)),
            },
            Token::LParen => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some((Token::RParen, _)) => Ok(inner),
                    Some((other, pos)) => Err(ExprError::UnexpectedToken {
                        found: format!("{other:?}"),
                        pos,
                    }),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            other => Err(ExprError::UnexpectedToken {
                found: format!("{other:?}"),
                pos,
            }),
        }
    }
}

#[cfg(test)]
#[path = "expr_tests.rs"]
mod tests;
