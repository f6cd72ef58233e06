//! # Data Models Module / 数据模型模块
//!
//! This module defines the result tree produced by a run: step, scenario, rule
//! and feature results, the aggregate [`RunResult`], scenario identities used
//! for rerun files, and per-status counters used by reporters.
//!
//! 此模块定义运行产生的结果树：步骤、场景、规则和功能结果，
//! 聚合的 [`RunResult`]，用于重跑文件的场景标识，以及报告器使用的按状态计数器。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::core::document::KeywordClass;
use crate::core::registry::StepMatch;
use crate::infra::t;

/// Lifecycle verdict of a node.
///
/// Variants are declared in aggregation order, so the derived `Ord` is the
/// rollup order: `untested < skipped < passed < undefined < error < failed`.
///
/// 节点的生命周期结论。变体按聚合顺序声明，派生的 `Ord` 即汇总顺序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Untested,
    Skipped,
    Passed,
    Undefined,
    Error,
    Failed,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Untested,
        Status::Skipped,
        Status::Passed,
        Status::Undefined,
        Status::Error,
        Status::Failed,
    ];

    /// Maximum of `statuses`, or `Untested` when empty.
    pub fn rollup<I>(statuses: I) -> Status
    where
        I: IntoIterator<Item = Status>,
    {
        statuses.into_iter().max().unwrap_or_default()
    }

    /// `failed` and `error` scenarios land in the rerun set.
    pub fn is_failure(self) -> bool {
        matches!(self, Status::Failed | Status::Error)
    }

    /// A run is successful while its maximum status is at most `passed`.
    pub fn is_success(self) -> bool {
        self <= Status::Passed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Untested => "untested",
            Status::Skipped => "skipped",
            Status::Passed => "passed",
            Status::Undefined => "undefined",
            Status::Error => "error",
            Status::Failed => "failed",
        }
    }

    /// Localized label for console output.
    /// 用于控制台输出的本地化标签。
    pub fn label(self, locale: &str) -> String {
        match self {
            Status::Untested => t!("status.untested", locale = locale).to_string(),
            Status::Skipped => t!("status.skipped", locale = locale).to_string(),
            Status::Passed => t!("status.passed", locale = locale).to_string(),
            Status::Undefined => t!("status.undefined", locale = locale).to_string(),
            Status::Error => t!("status.error", locale = locale).to_string(),
            Status::Failed => t!("status.failed", locale = locale).to_string(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic output captured while a scope was active.
/// 作用域活动期间捕获的诊断输出。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
    pub log: String,
}

impl Captured {
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty() && self.log.is_empty()
    }

    pub fn append(&mut self, other: Captured) {
        self.stdout.push_str(&other.stdout);
        self.stderr.push_str(&other.stderr);
        self.log.push_str(&other.log);
    }
}

/// Identity of a concrete scenario: feature path plus declaration line
/// (the data-row line for outline rows).
/// 具体场景的标识：功能路径加声明行号（大纲行使用数据行的行号）。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ScenarioId {
    pub path: String,
    pub line: u32,
    pub name: String,
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.line)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub keyword: String,
    /// Effective keyword class used for matching.
    pub step_type: Option<KeywordClass>,
    pub text: String,
    pub line: u32,
    pub status: Status,
    pub duration: Duration,
    pub error_message: Option<String>,
    #[serde(rename = "match")]
    pub matched: Option<StepMatch>,
    pub captured: Captured,
    /// The step came from a feature or rule background.
    pub background: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub id: ScenarioId,
    pub keyword: String,
    pub name: String,
    pub tags: Vec<String>,
    pub status: Status,
    pub duration: Duration,
    /// Hook failure or skip reason attached to the scenario itself.
    pub error_message: Option<String>,
    /// Output of scenario-level hooks.
    pub captured: Captured,
    /// Background steps followed by the scenario's own steps.
    pub steps: Vec<StepResult>,
    /// Number of times the scenario was executed (0 when never started).
    pub attempts: u32,
}

impl ScenarioResult {
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|step| step.status.is_failure())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleResult {
    pub keyword: String,
    pub name: String,
    pub tags: Vec<String>,
    pub line: u32,
    pub status: Status,
    pub duration: Duration,
    pub error_message: Option<String>,
    pub captured: Captured,
    pub scenarios: Vec<ScenarioResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChildResult {
    Scenario(ScenarioResult),
    Rule(RuleResult),
}

impl ChildResult {
    pub fn status(&self) -> Status {
        match self {
            ChildResult::Scenario(scenario) => scenario.status,
            ChildResult::Rule(rule) => rule.status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureResult {
    pub keyword: String,
    pub name: String,
    pub path: String,
    pub tags: Vec<String>,
    pub line: u32,
    pub status: Status,
    pub duration: Duration,
    pub error_message: Option<String>,
    pub captured: Captured,
    /// Background step results of the first executed scenario.
    pub background: Vec<StepResult>,
    pub children: Vec<ChildResult>,
}

impl FeatureResult {
    /// All scenario results in document order, descending into rules.
    pub fn scenarios(&self) -> impl Iterator<Item = &ScenarioResult> + '_ {
        self.children.iter().flat_map(|child| -> Box<dyn Iterator<Item = &ScenarioResult> + '_> {
            match child {
                ChildResult::Scenario(scenario) => Box::new(std::iter::once(scenario)),
                ChildResult::Rule(rule) => Box::new(rule.scenarios.iter()),
            }
        })
    }

    pub fn rules(&self) -> impl Iterator<Item = &RuleResult> + '_ {
        self.children.iter().filter_map(|child| match child {
            ChildResult::Rule(rule) => Some(rule),
            ChildResult::Scenario(_) => None,
        })
    }
}

/// A step no registered pattern matched, with a suggested pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndefinedStep {
    pub path: String,
    pub line: u32,
    pub keyword: String,
    pub text: String,
    pub snippet: String,
}

/// Aggregate result of a whole run.
/// 整个运行的聚合结果。
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub status: Status,
    pub features: Vec<FeatureResult>,
    /// Failure of a suite-level hook.
    pub error_message: Option<String>,
    /// Output of suite-level hooks.
    pub captured: Captured,
    /// Identities of scenarios that ended `failed` or `error`.
    pub rerun: BTreeSet<ScenarioId>,
    pub undefined: Vec<UndefinedStep>,
    /// A stop signal was raised during the run.
    pub cancelled: bool,
}

impl RunResult {
    pub(crate) fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            duration: Duration::ZERO,
            status: Status::Untested,
            features: Vec::new(),
            error_message: None,
            captured: Captured::default(),
            rerun: BTreeSet::new(),
            undefined: Vec::new(),
            cancelled: false,
        }
    }

    /// Recomputes the run status and the rerun set from the feature results.
    pub(crate) fn finalize(&mut self, suite_error: bool) {
        let mut status = Status::rollup(self.features.iter().map(|feature| feature.status));
        if suite_error {
            status = status.max(Status::Error);
        }
        self.status = status;
        self.rerun = self
            .features
            .iter()
            .flat_map(FeatureResult::scenarios)
            .filter(|scenario| scenario.status.is_failure())
            .map(|scenario| scenario.id.clone())
            .collect();
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn scenarios(&self) -> impl Iterator<Item = &ScenarioResult> + '_ {
        self.features.iter().flat_map(FeatureResult::scenarios)
    }

    /// Per-level status counts. Background steps are counted once per
    /// feature, from the first scenario that ran them.
    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            duration: self.duration,
            ..Summary::default()
        };
        for feature in &self.features {
            summary.features.record(feature.status);
            for rule in feature.rules() {
                summary.rules.record(rule.status);
            }
            let mut background_counted = false;
            for scenario in feature.scenarios() {
                summary.scenarios.record(scenario.status);
                let has_background = scenario.steps.iter().any(|step| step.background);
                let count_background = has_background && !background_counted && scenario.attempts > 0;
                for step in &scenario.steps {
                    if !step.background || count_background {
                        summary.steps.record(step.status);
                    }
                }
                background_counted |= count_background;
            }
        }
        summary
    }
}

/// Number of nodes per status at one level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub untested: usize,
    pub skipped: usize,
    pub passed: usize,
    pub undefined: usize,
    pub error: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: Status) {
        *self.slot(status) += 1;
    }

    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Untested => self.untested,
            Status::Skipped => self.skipped,
            Status::Passed => self.passed,
            Status::Undefined => self.undefined,
            Status::Error => self.error,
            Status::Failed => self.failed,
        }
    }

    pub fn total(&self) -> usize {
        Status::ALL.iter().map(|status| self.get(*status)).sum()
    }

    fn slot(&mut self, status: Status) -> &mut usize {
        match status {
            Status::Untested => &mut self.untested,
            Status::Skipped => &mut self.skipped,
            Status::Passed => &mut self.passed,
            Status::Undefined => &mut self.undefined,
            Status::Error => &mut self.error,
            Status::Failed => &mut self.failed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub features: StatusCounts,
    pub rules: StatusCounts,
    pub scenarios: StatusCounts,
    pub steps: StatusCounts,
    pub duration: Duration,
}
