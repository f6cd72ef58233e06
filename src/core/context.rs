//! # Context Module / 上下文模块
//!
//! A layered key/value store shared by hooks and steps. The runner pushes a
//! layer when it enters a scope (suite, feature, rule, scenario) and
//! pops it on exit, so values set inside a scenario disappear when the
//! scenario ends while outer values stay visible. Steps and step hooks write
//! into the scenario layer, so values flow from one step to the next. Inner
//! layers shadow outer keys; nothing is ever deleted from an outer layer.
//!
//! 由钩子和步骤共享的分层键值存储。运行器在进入作用域时压入一层，
//! 退出时弹出，内层遮蔽外层键，外层的值永远不会被删除。

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::errors::ContextError;

/// Scope a context layer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScopeLevel {
    Root,
    Suite,
    Feature,
    Rule,
    Scenario,
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeLevel::Root => "root",
            ScopeLevel::Suite => "suite",
            ScopeLevel::Feature => "feature",
            ScopeLevel::Rule => "rule",
            ScopeLevel::Scenario => "scenario",
        };
        f.write_str(name)
    }
}

/// Who wrote a context value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Runner,
    User,
}

#[derive(Clone)]
struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    origin: Origin,
}

#[derive(Clone)]
struct Layer {
    level: ScopeLevel,
    values: HashMap<String, Entry>,
}

/// Per-scenario switches user hooks may flip before the steps run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ScenarioControl {
    pub skip_reason: Option<String>,
    pub continue_after_failed_step: bool,
}

/// Layered state visible to every hook and step of a run.
/// 对运行中每个钩子和步骤可见的分层状态。
pub struct Context {
    layers: Vec<Layer>,
    stdout: String,
    stderr: String,
    control: ScenarioControl,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("levels", &self.layers.iter().map(|layer| layer.level).collect::<Vec<_>>())
            .field("keys", &self.keys())
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            layers: vec![Layer {
                level: ScopeLevel::Root,
                values: HashMap::new(),
            }],
            stdout: String::new(),
            stderr: String::new(),
            control: ScenarioControl::default(),
        }
    }

    /// Stores `value` under `key` in the innermost layer.
    ///
    /// Fails when user code would shadow a key the runner owns.
    pub fn set<T: Any + Send + Sync>(&mut self, key: &str, value: T) -> Result<(), ContextError> {
        if self.origin_of(key) == Some(Origin::Runner) {
            return Err(ContextError::MasksRunnerKey { key: key.to_string() });
        }
        if let Some(layer) = self.layers.last_mut() {
            layer.values.insert(
                key.to_string(),
                Entry {
                    value: Arc::new(value),
                    origin: Origin::User,
                },
            );
        }
        Ok(())
    }

    /// Innermost value under `key`, if it has type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.lookup(key).and_then(|entry| entry.value.downcast_ref::<T>())
    }

    /// Mutable access to the innermost value under `key`. Returns `None` when
    /// the value is shared with another worker.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        let entry = self
            .layers
            .iter_mut()
            .rev()
            .find_map(|layer| layer.values.get_mut(key))?;
        Arc::get_mut(&mut entry.value).and_then(|value| value.downcast_mut::<T>())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Scope level of the innermost layer defining `key`.
    pub fn defined_at(&self, key: &str) -> Option<ScopeLevel> {
        self.layers
            .iter()
            .rev()
            .find(|layer| layer.values.contains_key(key))
            .map(|layer| layer.level)
    }

    pub fn origin_of(&self, key: &str) -> Option<Origin> {
        self.lookup(key).map(|entry| entry.origin)
    }

    /// Visible keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .layers
            .iter()
            .flat_map(|layer| layer.values.keys().map(String::as_str))
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    pub fn level(&self) -> ScopeLevel {
        self.layers.last().map_or(ScopeLevel::Root, |layer| layer.level)
    }

    /// Text written here lands in the captured stdout of the running scope.
    pub fn stdout(&mut self) -> &mut String {
        &mut self.stdout
    }

    pub fn stderr(&mut self) -> &mut String {
        &mut self.stderr
    }

    /// Marks the current scenario skipped. Honored from `before_scenario` and
    /// tag hooks; steps that already ran keep their status.
    pub fn skip_scenario(&mut self, reason: impl Into<String>) {
        self.control.skip_reason = Some(reason.into());
    }

    pub fn set_continue_after_failed_step(&mut self, enabled: bool) {
        self.control.continue_after_failed_step = enabled;
    }

    pub fn continue_after_failed_step(&self) -> bool {
        self.control.continue_after_failed_step
    }

    fn lookup(&self, key: &str) -> Option<&Entry> {
        self.layers.iter().rev().find_map(|layer| layer.values.get(key))
    }

    pub(crate) fn push(&mut self, level: ScopeLevel) {
        self.layers.push(Layer {
            level,
            values: HashMap::new(),
        });
    }

    pub(crate) fn pop(&mut self) {
        if self.layers.len() > 1 {
            self.layers.pop();
        }
    }

    pub(crate) fn set_runner<T: Any + Send + Sync>(&mut self, key: &str, value: T) {
        if let Some(layer) = self.layers.last_mut() {
            layer.values.insert(
                key.to_string(),
                Entry {
                    value: Arc::new(value),
                    origin: Origin::Runner,
                },
            );
        }
    }

    pub(crate) fn take_output(&mut self) -> (String, String) {
        (std::mem::take(&mut self.stdout), std::mem::take(&mut self.stderr))
    }

    pub(crate) fn reset_control(&mut self, continue_after_failed_step: bool) {
        self.control = ScenarioControl {
            skip_reason: None,
            continue_after_failed_step,
        };
    }

    pub(crate) fn control(&self) -> &ScenarioControl {
        &self.control
    }

    /// Snapshot for a parallel worker: same layers, values shared by
    /// reference, empty output buffers.
    pub(crate) fn fork(&self) -> Context {
        Context {
            layers: self.layers.clone(),
            stdout: String::new(),
            stderr: String::new(),
            control: ScenarioControl::default(),
        }
    }
}
