//! # Error Types Module / 错误类型模块
//!
//! This module defines the error taxonomy of the engine. Errors that make a run
//! impossible (malformed documents, malformed selection predicates, fatal
//! suite-level hooks) escape the runner; everything else is scoped to a single
//! node and recorded in its result.
//!
//! 此模块定义引擎的错误分类。使运行无法进行的错误（格式错误的文档、
//! 格式错误的选择谓词、致命的套件级钩子）会逃逸出运行器；
//! 其他所有错误都限定在单个节点内，并记录在其结果中。

use std::fmt;
use thiserror::Error;

use crate::core::hooks::HookPoint;
use crate::core::models::RunResult;
use crate::core::registry::ImplLocation;

/// A structural invariant of the document model does not hold.
/// Raised before any hook or step runs.
/// 文档模型的结构不变量不成立。在任何钩子或步骤运行之前引发。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}:{line}: {message}")]
pub struct ParseInvariantViolation {
    /// Path of the feature file containing the offending node.
    pub path: String,
    /// Declaration line of the offending node.
    pub line: u32,
    /// Human readable description of the violation.
    pub message: String,
}

impl ParseInvariantViolation {
    pub fn new(path: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

/// A tag expression could not be parsed.
/// 无法解析标签表达式。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid tag expression `{expression}`: {message} at position {position} (token `{token}`)")]
pub struct TagExpressionError {
    /// The full expression text as supplied.
    pub expression: String,
    /// What went wrong.
    pub message: String,
    /// The offending token (empty at end of input).
    pub token: String,
    /// Character offset of the offending token.
    pub position: usize,
}

/// A step pattern or parameter type could not be compiled.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern `{pattern}`: {message} at position {position}")]
    Placeholder {
        pattern: String,
        message: String,
        position: usize,
    },
    #[error("pattern `{pattern}` uses unknown parameter type `{type_name}`")]
    UnknownType { pattern: String, type_name: String },
    #[error("pattern `{pattern}` is not a valid regular expression: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("parameter type `{0}` is already registered")]
    DuplicateType(String),
}

/// One registered pattern that matched an ambiguous step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCandidate {
    pub pattern: String,
    pub location: ImplLocation,
}

impl fmt::Display for MatchCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" @ {}", self.pattern, self.location)
    }
}

fn render_candidates(candidates: &[MatchCandidate]) -> String {
    candidates
        .iter()
        .map(|candidate| format!("\n  - {candidate}"))
        .collect()
}

/// More than one registered pattern matches a step's text.
/// Every conflicting candidate is listed, not just the first.
/// 多个已注册的模式匹配同一步骤文本。列出所有冲突的候选项，而不仅仅是第一个。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ambiguous step `{text}` matches {} patterns:{}", .candidates.len(), render_candidates(.candidates))]
pub struct AmbiguousMatchError {
    pub text: String,
    pub candidates: Vec<MatchCandidate>,
}

/// Failure to resolve a step to exactly one usable match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error(transparent)]
    Ambiguous(#[from] AmbiguousMatchError),
    #[error("cannot convert argument `{argument}` value `{value}` to {type_name}: {message}")]
    Conversion {
        argument: String,
        value: String,
        type_name: String,
        message: String,
    },
}

/// No registered pattern matches a step. Not an exception path: the runner
/// records it as the step's `undefined` message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("undefined step: {keyword} {text}")]
pub struct UndefinedStepError {
    pub keyword: String,
    pub text: String,
}

/// A step implementation returned an error or panicked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StepExecutionError {
    pub message: String,
    /// The implementation returned [`StopRun`].
    pub stop_requested: bool,
}

/// A hook callable returned an error or panicked.
/// 钩子调用返回错误或发生 panic。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{hook} hook failed: {message}")]
pub struct HookExecutionError {
    pub hook: HookPoint,
    pub message: String,
    /// A callable returned [`StopRun`].
    pub stop_requested: bool,
}

/// A `before_all` or `after_all` hook failed. The partial run result is
/// attached so no recorded failure is lost.
/// `before_all` 或 `after_all` 钩子失败。附带部分运行结果，以免丢失任何已记录的失败。
#[derive(Debug, Error)]
#[error("fatal error in {hook} hook: {message}")]
pub struct FatalRunError {
    pub hook: HookPoint,
    pub message: String,
    pub result: Box<RunResult>,
}

/// Errors escaping [`Runner::run`](crate::core::execution::Runner::run).
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Invariant(#[from] ParseInvariantViolation),
    #[error(transparent)]
    Fatal(#[from] FatalRunError),
}

impl RunError {
    /// The partial run result, when execution had already started.
    pub fn result(&self) -> Option<&RunResult> {
        match self {
            RunError::Invariant(_) => None,
            RunError::Fatal(fatal) => Some(&fatal.result),
        }
    }
}

/// Misuse of the layered [`Context`](crate::core::context::Context).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("`{key}` is owned by the runner and cannot be overwritten from user code")]
    MasksRunnerKey { key: String },
}

/// Invalid runner configuration or selection input.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    TagExpression(#[from] TagExpressionError),
    #[error("invalid scenario name pattern `{pattern}`: {source}")]
    NamePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid location `{0}`; expected `path:line`")]
    Location(String),
    #[error("retry.max_attempts must be at least 1")]
    ZeroRetryAttempts,
}

/// Returned from a step or hook to abort the whole run. Remaining scopes are
/// skipped; every entered scope still receives its `after_*` hooks.
/// 从步骤或钩子返回以中止整个运行。剩余作用域被跳过；每个已进入的作用域仍会收到其 `after_*` 钩子。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("run stopped: {reason}")]
pub struct StopRun {
    pub reason: String,
}

impl StopRun {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
