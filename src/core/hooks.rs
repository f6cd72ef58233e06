//! # Hooks Module / 钩子模块
//!
//! Named lifecycle slots (`before_all` … `after_tag`), each holding zero or more
//! callables invoked in registration order. A `before_*` slot stops at its
//! first failing callable; an `after_*` slot always runs every callable and
//! joins their failures. Panics are converted into errors.
//!
//! 命名的生命周期插槽，每个插槽按注册顺序调用零个或多个可调用对象。
//! `before_*` 插槽在第一个失败处停止；`after_*` 插槽总是运行所有可调用对象。

use anyhow::Result;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::core::context::Context;
use crate::core::document::{Feature, Rule, Scenario, Step};
use crate::core::errors::{HookExecutionError, StopRun};
use crate::core::models::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    BeforeAll,
    AfterAll,
    BeforeFeature,
    AfterFeature,
    BeforeRule,
    AfterRule,
    BeforeScenario,
    AfterScenario,
    BeforeStep,
    AfterStep,
    BeforeTag,
    AfterTag,
}

impl HookPoint {
    pub fn is_before(self) -> bool {
        matches!(
            self,
            HookPoint::BeforeAll
                | HookPoint::BeforeFeature
                | HookPoint::BeforeRule
                | HookPoint::BeforeScenario
                | HookPoint::BeforeStep
                | HookPoint::BeforeTag
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HookPoint::BeforeAll => "before_all",
            HookPoint::AfterAll => "after_all",
            HookPoint::BeforeFeature => "before_feature",
            HookPoint::AfterFeature => "after_feature",
            HookPoint::BeforeRule => "before_rule",
            HookPoint::AfterRule => "after_rule",
            HookPoint::BeforeScenario => "before_scenario",
            HookPoint::AfterScenario => "after_scenario",
            HookPoint::BeforeStep => "before_step",
            HookPoint::AfterStep => "after_step",
            HookPoint::BeforeTag => "before_tag",
            HookPoint::AfterTag => "after_tag",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The node a hook is invoked for.
#[derive(Debug, Clone, Copy)]
pub enum HookScope<'a> {
    Suite,
    Feature(&'a Feature),
    Rule(&'a Rule),
    Scenario(&'a Scenario),
    Step(&'a Step),
    Tag(&'a str),
}

/// Arguments passed to every hook callable.
#[derive(Debug, Clone, Copy)]
pub struct HookEvent<'a> {
    pub point: HookPoint,
    pub scope: HookScope<'a>,
    /// Final status of the scope, for `after_*` hooks.
    pub status: Option<Status>,
}

impl HookEvent<'_> {
    /// Name of the node, or the tag name for tag hooks.
    pub fn name(&self) -> &str {
        match self.scope {
            HookScope::Suite => "",
            HookScope::Feature(feature) => &feature.name,
            HookScope::Rule(rule) => &rule.name,
            HookScope::Scenario(scenario) => &scenario.name,
            HookScope::Step(step) => &step.text,
            HookScope::Tag(tag) => tag,
        }
    }
}

pub type HookFn = dyn Fn(&mut Context, &HookEvent<'_>) -> Result<()> + Send + Sync;

/// Registered hook callables, keyed by lifecycle point.
/// 已注册的钩子可调用对象，按生命周期点分组。
#[derive(Clone, Default)]
pub struct Hooks {
    slots: HashMap<HookPoint, Vec<Arc<HookFn>>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<(HookPoint, usize)> = self
            .slots
            .iter()
            .map(|(point, callables)| (*point, callables.len()))
            .collect();
        counts.sort();
        f.debug_map().entries(counts).finish()
    }
}

macro_rules! hook_registrars {
    ($($method:ident => $point:ident),* $(,)?) => {
        $(
            pub fn $method<F>(&mut self, hook: F) -> &mut Self
            where
                F: Fn(&mut Context, &HookEvent<'_>) -> Result<()> + Send + Sync + 'static,
            {
                self.register(HookPoint::$point, hook)
            }
        )*
    };
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, point: HookPoint, hook: F) -> &mut Self
    where
        F: Fn(&mut Context, &HookEvent<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.slots.entry(point).or_default().push(Arc::new(hook));
        self
    }

    hook_registrars! {
        before_all => BeforeAll,
        after_all => AfterAll,
        before_feature => BeforeFeature,
        after_feature => AfterFeature,
        before_rule => BeforeRule,
        after_rule => AfterRule,
        before_scenario => BeforeScenario,
        after_scenario => AfterScenario,
        before_step => BeforeStep,
        after_step => AfterStep,
        before_tag => BeforeTag,
        after_tag => AfterTag,
    }

    pub fn count(&self, point: HookPoint) -> usize {
        self.slots.get(&point).map_or(0, Vec::len)
    }

    /// Runs every callable in the slot of `event.point`.
    pub fn invoke(&self, context: &mut Context, event: &HookEvent<'_>) -> Result<(), HookExecutionError> {
        let Some(callables) = self.slots.get(&event.point) else {
            return Ok(());
        };
        let mut failures = Vec::new();
        let mut stop_requested = false;
        for hook in callables {
            if let Err(failure) = call_guarded(|| hook(context, event)) {
                stop_requested |= failure.stop_requested;
                failures.push(failure.message);
                if event.point.is_before() {
                    break;
                }
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(HookExecutionError {
                hook: event.point,
                message: failures.join("\n"),
                stop_requested,
            })
        }
    }
}

/// A failed call into user code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Failure {
    pub message: String,
    /// The callable returned [`StopRun`].
    pub stop_requested: bool,
}

/// Calls user code, turning both returned errors and panics into a [`Failure`].
pub(crate) fn call_guarded<F>(f: F) -> Result<(), Failure>
where
    F: FnOnce() -> Result<()>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(Failure {
            stop_requested: error.downcast_ref::<StopRun>().is_some(),
            message: format!("{error:#}"),
        }),
        Err(payload) => Err(Failure {
            message: format!("panicked: {}", panic_message(payload.as_ref())),
            stop_requested: false,
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
