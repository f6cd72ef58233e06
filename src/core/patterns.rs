//! # Step Pattern Module / 步骤模式模块
//!
//! Compiles step patterns into anchored regular expressions. Two syntaxes are
//! interchangeable:
//!
//! - **Parameterized**: `the result is {n:int}`. `{}`, `{name}`, `{:type}` and
//!   `{name:type}` placeholders become capture groups; `{{` and `}}` are literal
//!   braces. Types come from a [`ParameterTypes`] table (`int`, `float`, `word`
//!   and their aliases `d`, `f`, `w` are built in).
//! - **Regex**: any pattern starting with `^`, or registered explicitly as a
//!   regex. Every capture group becomes a string argument, named when the
//!   group is named.
//!
//! 将步骤模式编译为锚定的正则表达式。支持参数化语法和原始正则表达式两种写法。

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::errors::{MatchError, PatternError};

/// Regex used by placeholders without a type.
const UNTYPED_REGEX: &str = ".+?";

/// A typed argument value extracted from step text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Str(value) => f.write_str(value),
            Value::Bool(value) => write!(f, "{value}"),
        }
    }
}

/// Conversion from an extracted [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.to_string())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(value) => Some(*value),
            Value::Str(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

macro_rules! int_from_value {
    ($($ty:ty),*) => {
        $(impl FromValue for $ty {
            fn from_value(value: &Value) -> Option<Self> {
                i64::from_value(value).and_then(|v| <$ty>::try_from(v).ok())
            }
        })*
    };
}

int_from_value!(i32, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            Value::Str(text) => text.trim().parse().ok(),
            Value::Bool(_) => None,
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(value) => Some(*value),
            Value::Str(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

type ConvertFn = dyn Fn(&str) -> Result<Value, String> + Send + Sync;

/// A named placeholder type: the regex it matches and how matched text is
/// converted.
/// 命名的占位符类型：匹配的正则表达式以及如何转换匹配的文本。
#[derive(Clone)]
pub struct ParameterType {
    pub name: String,
    pub regex: String,
    convert: Arc<ConvertFn>,
}

impl ParameterType {
    pub fn new<F>(name: impl Into<String>, regex: impl Into<String>, convert: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            regex: regex.into(),
            convert: Arc::new(convert),
        }
    }

    pub fn convert(&self, text: &str) -> Result<Value, String> {
        (self.convert)(text)
    }

    fn int(name: &str) -> Self {
        Self::new(name, r"[-+]?\d+", |text| {
            text.parse::<i64>().map(Value::Int).map_err(|e| e.to_string())
        })
    }

    fn float(name: &str) -> Self {
        Self::new(
            name,
            r"[-+]?(?:\d+\.\d*|\.\d+|\d+)(?:[eE][-+]?\d+)?",
            |text| text.parse::<f64>().map(Value::Float).map_err(|e| e.to_string()),
        )
    }

    fn word(name: &str) -> Self {
        Self::new(name, r"[^\s]+", |text| Ok(Value::Str(text.to_string())))
    }
}

impl fmt::Debug for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterType")
            .field("name", &self.name)
            .field("regex", &self.regex)
            .finish_non_exhaustive()
    }
}

/// Table of parameter types available to parameterized patterns.
#[derive(Debug, Clone)]
pub struct ParameterTypes {
    types: HashMap<String, ParameterType>,
}

impl Default for ParameterTypes {
    fn default() -> Self {
        let mut types = HashMap::new();
        for ty in [
            ParameterType::int("int"),
            ParameterType::int("d"),
            ParameterType::float("float"),
            ParameterType::float("f"),
            ParameterType::word("word"),
            ParameterType::word("w"),
        ] {
            types.insert(ty.name.clone(), ty);
        }
        Self { types }
    }
}

impl ParameterTypes {
    pub fn register(&mut self, ty: ParameterType) -> Result<(), PatternError> {
        if self.types.contains_key(&ty.name) {
            return Err(PatternError::DuplicateType(ty.name));
        }
        self.types.insert(ty.name.clone(), ty);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParameterType> {
        self.types.get(name)
    }
}

/// Which syntax a pattern was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternSyntax {
    Parameterized,
    Regex,
}

#[derive(Debug, Clone)]
struct Parameter {
    name: Option<String>,
    group: String,
    ty: Option<ParameterType>,
}

/// A value extracted from step text by a matched pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Value,
    /// Matched text before conversion.
    pub raw: String,
    /// Byte offsets of the match inside the step text.
    pub start: usize,
    pub end: usize,
}

/// A compiled, anchored step pattern.
/// 已编译的锚定步骤模式。
#[derive(Debug, Clone)]
pub struct StepPattern {
    source: String,
    syntax: PatternSyntax,
    regex: Regex,
    parameters: Vec<Parameter>,
}

impl StepPattern {
    /// Compiles `source`, treating a leading `^` as a raw regex.
    pub fn compile(source: &str, types: &ParameterTypes) -> Result<Self, PatternError> {
        if source.starts_with('^') {
            Self::compile_regex(source)
        } else {
            Self::compile_parameterized(source, types)
        }
    }

    pub fn compile_regex(source: &str) -> Result<Self, PatternError> {
        // Inner `^` and `$` stay put; they are no-ops inside the anchored group.
        let regex = anchored(source, source)?;
        let parameters = regex
            .capture_names()
            .enumerate()
            .skip(1)
            .map(|(index, name)| Parameter {
                name: name.map(str::to_string),
                group: name.map_or_else(|| index.to_string(), str::to_string),
                ty: None,
            })
            .collect();
        Ok(Self {
            source: source.to_string(),
            syntax: PatternSyntax::Regex,
            regex,
            parameters,
        })
    }

    pub fn compile_parameterized(source: &str, types: &ParameterTypes) -> Result<Self, PatternError> {
        let placeholder_error = |message: &str, position: usize| PatternError::Placeholder {
            pattern: source.to_string(),
            message: message.to_string(),
            position,
        };

        let mut body = String::with_capacity(source.len() * 2);
        let mut parameters: Vec<Parameter> = Vec::new();
        let mut literal = String::new();
        let chars: Vec<(usize, char)> = source.char_indices().collect();
        let mut i = 0;
        while i < chars.len() {
            let (position, ch) = chars[i];
            let next = chars.get(i + 1).map(|(_, c)| *c);
            match (ch, next) {
                ('{', Some('{')) | ('}', Some('}')) => {
                    literal.push(ch);
                    i += 2;
                }
                ('}', _) => return Err(placeholder_error("unmatched closing brace", position)),
                ('{', _) => {
                    let close = chars[i + 1..]
                        .iter()
                        .position(|(_, c)| *c == '}' || *c == '{')
                        .map(|offset| i + 1 + offset)
                        .filter(|end| chars[*end].1 == '}')
                        .ok_or_else(|| placeholder_error("missing closing brace for placeholder", position))?;
                    let inner: String = chars[i + 1..close].iter().map(|(_, c)| *c).collect();
                    let (name, type_name) = match inner.split_once(':') {
                        Some((name, ty)) => (name.trim(), Some(ty.trim())),
                        None => (inner.trim(), None),
                    };
                    if !name.is_empty() && !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                        return Err(placeholder_error("invalid placeholder name", position));
                    }
                    if !name.is_empty()
                        && parameters.iter().any(|p| p.name.as_deref() == Some(name))
                    {
                        return Err(placeholder_error("duplicate placeholder name", position));
                    }
                    let ty = match type_name {
                        Some("") => return Err(placeholder_error("empty parameter type", position)),
                        Some(type_name) => Some(types.get(type_name).cloned().ok_or_else(|| {
                            PatternError::UnknownType {
                                pattern: source.to_string(),
                                type_name: type_name.to_string(),
                            }
                        })?),
                        None => None,
                    };
                    body.push_str(&regex::escape(&literal));
                    literal.clear();
                    let group = format!("__p{}", parameters.len());
                    let group_regex = ty.as_ref().map_or(UNTYPED_REGEX, |ty| ty.regex.as_str());
                    body.push_str(&format!("(?P<{group}>{group_regex})"));
                    parameters.push(Parameter {
                        name: (!name.is_empty()).then(|| name.to_string()),
                        group,
                        ty,
                    });
                    i = close + 1;
                }
                _ => {
                    literal.push(ch);
                    i += 1;
                }
            }
        }
        body.push_str(&regex::escape(&literal));
        let regex = anchored(source, &body)?;
        Ok(Self {
            source: source.to_string(),
            syntax: PatternSyntax::Parameterized,
            regex,
            parameters,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn syntax(&self) -> PatternSyntax {
        self.syntax
    }

    /// Full-match test without argument conversion.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Extracts and converts arguments. `None` when the text does not match.
    pub fn extract(&self, text: &str) -> Option<Result<Vec<Argument>, MatchError>> {
        let captures = self.regex.captures(text)?;
        let mut arguments = Vec::with_capacity(self.parameters.len());
        for (index, parameter) in self.parameters.iter().enumerate() {
            let group = match parameter.group.parse::<usize>() {
                Ok(number) => captures.get(number),
                Err(_) => captures.name(&parameter.group),
            };
            let Some(group) = group else {
                continue;
            };
            let raw = group.as_str().to_string();
            let value = match &parameter.ty {
                Some(ty) => match ty.convert(&raw) {
                    Ok(value) => value,
                    Err(message) => {
                        return Some(Err(MatchError::Conversion {
                            argument: parameter
                                .name
                                .clone()
                                .unwrap_or_else(|| index.to_string()),
                            value: raw,
                            type_name: ty.name.clone(),
                            message,
                        }));
                    }
                },
                None => Value::Str(raw.clone()),
            };
            arguments.push(Argument {
                name: parameter.name.clone(),
                value,
                raw,
                start: group.start(),
                end: group.end(),
            });
        }
        Some(Ok(arguments))
    }
}

fn anchored(source: &str, body: &str) -> Result<Regex, PatternError> {
    Regex::new(&format!("^(?:{body})$")).map_err(|source_error| PatternError::Regex {
        pattern: source.to_string(),
        source: source_error,
    })
}

/// Suggests a parameterized pattern for undefined step text: quoted strings
/// and numbers become placeholders.
/// 为未定义的步骤文本建议一个参数化模式。
pub fn suggest_pattern(text: &str) -> String {
    use once_cell::sync::Lazy;
    static SUGGEST: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#""[^"]*"|(?:^|\b)[-+]?\d+(?:\.\d+)?\b"#).expect("suggestion regex is valid")
    });
    let escaped = text.replace('{', "{{").replace('}', "}}");
    SUGGEST
        .replace_all(&escaped, |caps: &regex::Captures<'_>| {
            let matched = &caps[0];
            if matched.starts_with('"') {
                "\"{}\"".to_string()
            } else if matched.contains('.') {
                "{:float}".to_string()
            } else {
                "{:int}".to_string()
            }
        })
        .into_owned()
}
