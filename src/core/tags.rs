//! # Tag Expression Module / 标签表达式模块
//!
//! Boolean selection predicates over tag sets. The grammar accepts tag
//! literals, `and`, `or`, `not` and parentheses, with `not` binding tighter
//! than `and`, which binds tighter than `or`:
//!
//! ```text
//! expr    := or
//! or      := and ("or" and)*
//! and     := unary ("and" unary)*
//! unary   := "not" unary | primary
//! primary := "(" expr ")" | TAG
//! ```
//!
//! A legacy form is also accepted: whitespace-separated groups are AND-ed,
//! comma-separated terms inside a group are OR-ed, and a `-` or `~` prefix
//! negates a term (`@fast,@smoke -@wip`).
//!
//! 标签集合上的布尔选择谓词。同时支持旧式语法：空格分隔的组按 AND 组合，
//! 组内逗号分隔的项按 OR 组合，`-` 或 `~` 前缀表示取反。

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::core::errors::TagExpressionError;

/// Read access to a set of tag names. Leading `@` is ignored on both sides.
pub trait TagLookup {
    fn has_tag(&self, name: &str) -> bool;
}

fn any_tag<'a, S, I>(tags: I, name: &str) -> bool
where
    S: AsRef<str> + 'a,
    I: IntoIterator<Item = &'a S>,
{
    tags.into_iter()
        .any(|tag| tag.as_ref().trim_start_matches('@') == name)
}

impl<S: AsRef<str>> TagLookup for [S] {
    fn has_tag(&self, name: &str) -> bool {
        any_tag(self, name)
    }
}

impl<S: AsRef<str>> TagLookup for Vec<S> {
    fn has_tag(&self, name: &str) -> bool {
        any_tag(self, name)
    }
}

impl<S: AsRef<str>, const N: usize> TagLookup for [S; N] {
    fn has_tag(&self, name: &str) -> bool {
        any_tag(self, name)
    }
}

impl<S: AsRef<str>> TagLookup for BTreeSet<S> {
    fn has_tag(&self, name: &str) -> bool {
        any_tag(self, name)
    }
}

impl<S: AsRef<str>> TagLookup for HashSet<S> {
    fn has_tag(&self, name: &str) -> bool {
        any_tag(self, name)
    }
}

impl<T: TagLookup + ?Sized> TagLookup for &T {
    fn has_tag(&self, name: &str) -> bool {
        (**self).has_tag(name)
    }
}

/// A parsed tag expression.
/// 已解析的标签表达式。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagExpression {
    /// The empty expression. Always true.
    Always,
    Literal(String),
    Not(Box<TagExpression>),
    And(Box<TagExpression>, Box<TagExpression>),
    Or(Box<TagExpression>, Box<TagExpression>),
}

impl TagExpression {
    /// Parses `expression`, detecting the legacy comma/dash form.
    pub fn parse(expression: &str) -> Result<Self, TagExpressionError> {
        let tokens = tokenize(expression);
        if tokens.is_empty() {
            return Ok(TagExpression::Always);
        }
        if is_legacy(&tokens) {
            return parse_legacy(expression, &tokens);
        }
        let mut parser = Parser {
            expression,
            tokens: &tokens,
            cursor: 0,
        };
        let parsed = parser.parse_or()?;
        match parser.peek() {
            None => Ok(parsed),
            Some(token) if token.text == ")" => {
                Err(parser.error_at(token, "unbalanced closing parenthesis"))
            }
            Some(token) if is_operator_like(token.text) => Err(parser.error_at(token, "unknown operator")),
            Some(token) => Err(parser.error_at(token, "unexpected token")),
        }
    }

    /// Evaluates against `tags`. `and`/`or` short-circuit left to right.
    pub fn evaluate<T: TagLookup + ?Sized>(&self, tags: &T) -> bool {
        match self {
            TagExpression::Always => true,
            TagExpression::Literal(name) => tags.has_tag(name),
            TagExpression::Not(inner) => !inner.evaluate(tags),
            TagExpression::And(left, right) => left.evaluate(tags) && right.evaluate(tags),
            TagExpression::Or(left, right) => left.evaluate(tags) || right.evaluate(tags),
        }
    }

    fn and(left: TagExpression, right: TagExpression) -> TagExpression {
        TagExpression::And(Box::new(left), Box::new(right))
    }

    fn or(left: TagExpression, right: TagExpression) -> TagExpression {
        TagExpression::Or(Box::new(left), Box::new(right))
    }
}

impl fmt::Display for TagExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagExpression::Always => Ok(()),
            TagExpression::Literal(name) => write!(f, "@{name}"),
            TagExpression::Not(inner) => write!(f, "not {inner}"),
            TagExpression::And(left, right) => write!(f, "({left} and {right})"),
            TagExpression::Or(left, right) => write!(f, "({left} or {right})"),
        }
    }
}

/// Parses and evaluates in one call.
pub fn evaluate<T: TagLookup + ?Sized>(expression: &str, tags: &T) -> Result<bool, TagExpressionError> {
    Ok(TagExpression::parse(expression)?.evaluate(tags))
}

/// Several expressions AND-ed together. An empty filter selects everything.
/// 多个表达式按 AND 组合。空过滤器选择所有内容。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    expressions: Vec<TagExpression>,
}

impl TagFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_all<I, S>(expressions: I) -> Result<Self, TagExpressionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let expressions = expressions
            .into_iter()
            .map(|expression| TagExpression::parse(expression.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { expressions })
    }

    pub fn push(&mut self, expression: TagExpression) {
        self.expressions.push(expression);
    }

    pub fn is_empty(&self) -> bool {
        self.expressions
            .iter()
            .all(|expression| *expression == TagExpression::Always)
    }

    pub fn matches<T: TagLookup + ?Sized>(&self, tags: &T) -> bool {
        self.expressions.iter().all(|expression| expression.evaluate(tags))
    }
}

#[derive(Debug, Clone)]
struct Token<'a> {
    text: &'a str,
    /// Character offset in the source expression.
    position: usize,
}

fn tokenize(expression: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<(usize, usize)> = None;
    for (char_index, (byte_index, ch)) in expression.char_indices().enumerate() {
        let is_paren = ch == '(' || ch == ')';
        if ch.is_whitespace() || is_paren {
            if let Some((begin, position)) = start.take() {
                tokens.push(Token {
                    text: &expression[begin..byte_index],
                    position,
                });
            }
            if is_paren {
                tokens.push(Token {
                    text: &expression[byte_index..byte_index + 1],
                    position: char_index,
                });
            }
        } else if start.is_none() {
            start = Some((byte_index, char_index));
        }
    }
    if let Some((begin, position)) = start {
        tokens.push(Token {
            text: &expression[begin..],
            position,
        });
    }
    tokens
}

fn is_keyword(text: &str) -> bool {
    matches!(text, "and" | "or" | "not")
}

fn is_legacy(tokens: &[Token<'_>]) -> bool {
    let uses_keywords = tokens.iter().any(|token| is_keyword(token.text) || token.text == "(");
    !uses_keywords
        && tokens.iter().any(|token| {
            token.text.contains(',') || token.text.starts_with('-') || token.text.starts_with('~')
        })
}

fn is_operator_like(text: &str) -> bool {
    const OPERATORS: [&str; 7] = ["&&", "||", "&", "|", "!", "^", "=="];
    OPERATORS.contains(&text) || text.starts_with('!') || text.starts_with("&&") || text.starts_with("||")
}

fn literal(text: &str) -> TagExpression {
    TagExpression::Literal(text.trim_start_matches('@').to_string())
}

fn build_error(expression: &str, token: &str, position: usize, message: &str) -> TagExpressionError {
    TagExpressionError {
        expression: expression.to_string(),
        message: message.to_string(),
        token: token.to_string(),
        position,
    }
}

struct Parser<'a, 't> {
    expression: &'a str,
    tokens: &'t [Token<'a>],
    cursor: usize,
}

impl<'a, 't> Parser<'a, 't> {
    fn peek(&self) -> Option<&'t Token<'a>> {
        self.tokens.get(self.cursor)
    }

    fn next(&mut self) -> Option<&'t Token<'a>> {
        let token = self.tokens.get(self.cursor);
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn error_at(&self, token: &Token<'_>, message: &str) -> TagExpressionError {
        build_error(self.expression, token.text, token.position, message)
    }

    fn error_at_end(&self, message: &str) -> TagExpressionError {
        build_error(self.expression, "", self.expression.chars().count(), message)
    }

    fn parse_or(&mut self) -> Result<TagExpression, TagExpressionError> {
        let mut left = self.parse_and()?;
        while self.peek().is_some_and(|token| token.text == "or") {
            self.cursor += 1;
            let right = self.parse_and()?;
            left = TagExpression::or(left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<TagExpression, TagExpressionError> {
        let mut left = self.parse_unary()?;
        while self.peek().is_some_and(|token| token.text == "and") {
            self.cursor += 1;
            let right = self.parse_unary()?;
            left = TagExpression::and(left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<TagExpression, TagExpressionError> {
        if self.peek().is_some_and(|token| token.text == "not") {
            self.cursor += 1;
            let inner = self.parse_unary()?;
            return Ok(TagExpression::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<TagExpression, TagExpressionError> {
        let Some(token) = self.next() else {
            return Err(self.error_at_end("unexpected end of expression"));
        };
        match token.text {
            "(" => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(close) if close.text == ")" => Ok(inner),
                    Some(other) => Err(self.error_at(other, "expected closing parenthesis")),
                    None => Err(self.error_at(token, "missing closing parenthesis")),
                }
            }
            ")" => Err(self.error_at(token, "unbalanced closing parenthesis")),
            text if is_keyword(text) => Err(self.error_at(token, "expected a tag but found an operator")),
            text if is_operator_like(text) => Err(self.error_at(token, "unknown operator")),
            text if text.trim_start_matches('@').is_empty() => {
                Err(self.error_at(token, "empty tag name"))
            }
            text => Ok(literal(text)),
        }
    }
}

fn parse_legacy(expression: &str, tokens: &[Token<'_>]) -> Result<TagExpression, TagExpressionError> {
    let mut groups = Vec::new();
    for token in tokens {
        let mut terms = Vec::new();
        let mut offset = token.position;
        for raw in token.text.split(',') {
            let (negated, name) = match raw.strip_prefix('-').or_else(|| raw.strip_prefix('~')) {
                Some(rest) => (true, rest),
                None => (false, raw),
            };
            if name.trim_start_matches('@').is_empty() {
                return Err(build_error(expression, raw, offset, "empty tag in legacy group"));
            }
            if is_operator_like(name) {
                return Err(build_error(expression, raw, offset, "unknown operator"));
            }
            let term = literal(name);
            terms.push(if negated {
                TagExpression::Not(Box::new(term))
            } else {
                term
            });
            offset += raw.chars().count() + 1;
        }
        if let Some(group) = terms.into_iter().reduce(TagExpression::or) {
            groups.push(group);
        }
    }
    Ok(groups
        .into_iter()
        .reduce(TagExpression::and)
        .unwrap_or(TagExpression::Always))
}
