//! # Step Registry Module / 步骤注册表模块
//!
//! Maps `(pattern class, pattern)` pairs to step implementations and resolves
//! a step's text to exactly one of them. Registration is append-only and
//! happens before a run; lookups are pure and never mutate the registry, so a
//! registry can be shared read-only between parallel feature workers.
//!
//! 将（模式类别，模式）对映射到步骤实现，并将步骤文本解析为唯一一个实现。
//! 注册只追加且在运行前完成；查找是纯函数，不会修改注册表。

use serde::Serialize;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use anyhow::{Result, anyhow};

use crate::core::context::Context;
use crate::core::document::{DocString, KeywordClass, Step, Table};
use crate::core::errors::{AmbiguousMatchError, MatchCandidate, MatchError, PatternError};
use crate::core::patterns::{Argument, FromValue, ParameterType, ParameterTypes, StepPattern};

/// The keyword class a pattern was registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternClass {
    Context,
    Action,
    Outcome,
    /// Matches steps of every keyword class.
    Any,
}

impl PatternClass {
    /// Whether a step resolved to `step_type` may use this pattern.
    pub fn accepts(self, step_type: Option<KeywordClass>) -> bool {
        match (self, step_type) {
            (PatternClass::Any, _) => true,
            (PatternClass::Context, Some(KeywordClass::Context)) => true,
            (PatternClass::Action, Some(KeywordClass::Action)) => true,
            (PatternClass::Outcome, Some(KeywordClass::Outcome)) => true,
            _ => false,
        }
    }
}

impl From<KeywordClass> for PatternClass {
    fn from(class: KeywordClass) -> Self {
        match class {
            KeywordClass::Context => PatternClass::Context,
            KeywordClass::Action => PatternClass::Action,
            KeywordClass::Outcome => PatternClass::Outcome,
            KeywordClass::Conjunction => PatternClass::Any,
        }
    }
}

/// Source location of a step implementation, captured at registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImplLocation {
    pub file: String,
    pub line: u32,
}

impl ImplLocation {
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file().to_string(),
            line: location.line(),
        }
    }
}

impl fmt::Display for ImplLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Signature of a step implementation.
pub type StepFn = dyn Fn(&mut Context, &StepCall<'_>) -> Result<()> + Send + Sync;

/// Arguments handed to a step implementation.
/// 传递给步骤实现的参数。
#[derive(Debug, Clone, Copy)]
pub struct StepCall<'a> {
    pub step: &'a Step,
    pub arguments: &'a [Argument],
}

impl<'a> StepCall<'a> {
    /// Named argument converted to `T`.
    pub fn arg<T: FromValue>(&self, name: &str) -> Result<T> {
        let argument = self
            .arguments
            .iter()
            .find(|argument| argument.name.as_deref() == Some(name))
            .ok_or_else(|| anyhow!("step has no argument named `{name}`"))?;
        T::from_value(&argument.value).ok_or_else(|| {
            anyhow!(
                "argument `{name}` ({}) cannot be converted to {}",
                argument.value.type_name(),
                std::any::type_name::<T>()
            )
        })
    }

    /// Positional argument converted to `T`.
    pub fn arg_at<T: FromValue>(&self, index: usize) -> Result<T> {
        let argument = self
            .arguments
            .get(index)
            .ok_or_else(|| anyhow!("step has no argument at position {index}"))?;
        T::from_value(&argument.value).ok_or_else(|| {
            anyhow!(
                "argument {index} ({}) cannot be converted to {}",
                argument.value.type_name(),
                std::any::type_name::<T>()
            )
        })
    }

    pub fn text(&self) -> &'a str {
        &self.step.text
    }

    pub fn table(&self) -> Option<&'a Table> {
        self.step.table()
    }

    pub fn doc_string(&self) -> Option<&'a DocString> {
        self.step.doc_string()
    }
}

/// The binding of a step's text to exactly one registered implementation.
/// 步骤文本与唯一一个已注册实现的绑定。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepMatch {
    pub pattern: String,
    pub location: ImplLocation,
    pub arguments: Vec<Argument>,
    #[serde(skip)]
    definition: usize,
}

struct StepDefinition {
    class: PatternClass,
    pattern: StepPattern,
    location: ImplLocation,
    func: Arc<StepFn>,
}

/// Ordered collection of step definitions plus the parameter types their
/// patterns may use.
/// 步骤定义的有序集合以及模式可用的参数类型。
#[derive(Default)]
pub struct StepRegistry {
    types: ParameterTypes,
    definitions: Vec<StepDefinition>,
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.definitions.iter().map(|definition| {
                format!(
                    "{:?} \"{}\" @ {}",
                    definition.class,
                    definition.pattern.source(),
                    definition.location
                )
            }))
            .finish()
    }
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an implementation. Patterns starting with `^` are raw regexes.
    #[track_caller]
    pub fn register<F>(&mut self, class: PatternClass, pattern: &str, func: F) -> Result<&mut Self, PatternError>
    where
        F: Fn(&mut Context, &StepCall<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let location = ImplLocation::caller();
        let compiled = StepPattern::compile(pattern, &self.types)?;
        Ok(self.push(class, compiled, location, Arc::new(func)))
    }

    /// Registers an implementation whose pattern is always a raw regex.
    #[track_caller]
    pub fn register_regex<F>(&mut self, class: PatternClass, pattern: &str, func: F) -> Result<&mut Self, PatternError>
    where
        F: Fn(&mut Context, &StepCall<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let location = ImplLocation::caller();
        let compiled = StepPattern::compile_regex(pattern)?;
        Ok(self.push(class, compiled, location, Arc::new(func)))
    }

    #[track_caller]
    pub fn given<F>(&mut self, pattern: &str, func: F) -> Result<&mut Self, PatternError>
    where
        F: Fn(&mut Context, &StepCall<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register(PatternClass::Context, pattern, func)
    }

    #[track_caller]
    pub fn when<F>(&mut self, pattern: &str, func: F) -> Result<&mut Self, PatternError>
    where
        F: Fn(&mut Context, &StepCall<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register(PatternClass::Action, pattern, func)
    }

    #[track_caller]
    pub fn then<F>(&mut self, pattern: &str, func: F) -> Result<&mut Self, PatternError>
    where
        F: Fn(&mut Context, &StepCall<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register(PatternClass::Outcome, pattern, func)
    }

    /// Registers a pattern usable from any keyword class.
    #[track_caller]
    pub fn step<F>(&mut self, pattern: &str, func: F) -> Result<&mut Self, PatternError>
    where
        F: Fn(&mut Context, &StepCall<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register(PatternClass::Any, pattern, func)
    }

    /// Adds a custom parameter type for later parameterized patterns.
    pub fn register_type(&mut self, ty: ParameterType) -> Result<&mut Self, PatternError> {
        self.types.register(ty)?;
        Ok(self)
    }

    fn push(&mut self, class: PatternClass, pattern: StepPattern, location: ImplLocation, func: Arc<StepFn>) -> &mut Self {
        self.definitions.push(StepDefinition {
            class,
            pattern,
            location,
            func,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Drops every definition. Custom parameter types are kept.
    pub fn clear(&mut self) {
        self.definitions.clear();
    }

    /// Resolves `step` to at most one implementation.
    ///
    /// - no compatible pattern matches: `Ok(None)`
    /// - exactly one matches: its arguments, converted per declared type
    /// - several match: [`AmbiguousMatchError`] listing every candidate
    pub fn find_match(&self, step: &Step) -> Result<Option<StepMatch>, MatchError> {
        let matching: Vec<usize> = self
            .definitions
            .iter()
            .enumerate()
            .filter(|(_, definition)| definition.class.accepts(step.step_type))
            .filter(|(_, definition)| definition.pattern.is_match(&step.text))
            .map(|(index, _)| index)
            .collect();

        match matching.as_slice() {
            [] => Ok(None),
            [index] => {
                let definition = &self.definitions[*index];
                let arguments = match definition.pattern.extract(&step.text) {
                    Some(extracted) => extracted?,
                    None => Vec::new(),
                };
                Ok(Some(StepMatch {
                    pattern: definition.pattern.source().to_string(),
                    location: definition.location.clone(),
                    arguments,
                    definition: *index,
                }))
            }
            many => Err(AmbiguousMatchError {
                text: step.text.clone(),
                candidates: many
                    .iter()
                    .map(|index| {
                        let definition = &self.definitions[*index];
                        MatchCandidate {
                            pattern: definition.pattern.source().to_string(),
                            location: definition.location.clone(),
                        }
                    })
                    .collect(),
            }
            .into()),
        }
    }

    /// Invokes the implementation bound by `matched`.
    pub fn invoke(&self, matched: &StepMatch, context: &mut Context, step: &Step) -> Result<()> {
        let definition = self
            .definitions
            .get(matched.definition)
            .ok_or_else(|| anyhow!("step definition for `{}` is no longer registered", matched.pattern))?;
        let call = StepCall {
            step,
            arguments: &matched.arguments,
        };
        (definition.func)(context, &call)
    }
}
