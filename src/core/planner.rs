//! # Test Execution Planner Module / 测试执行计划模块
//!
//! This module resolves the active scenario set before anything runs: outlines
//! are expanded, effective tags are computed by walking feature → rule →
//! scenario, and every concrete scenario is checked against the selection
//! predicates (tag expressions, name patterns, `path:line` locations). The
//! resulting plan also carries the per-scenario execution policy
//! (continue-after-failed-step and retry attempts).
//!
//! 此模块在任何内容运行之前解析活动场景集：展开场景大纲，
//! 计算有效标签，并根据选择谓词检查每个具体场景。
//! 生成的计划还包含每个场景的执行策略。

use regex::Regex;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::core::config::RunOptions;
use crate::core::document::{
    Feature, FeatureChild, Rule, Scenario, ScenarioDefinition, Suite, TagSet, effective_tags,
};
use crate::core::errors::ConfigError;
use crate::core::models::ScenarioId;
use crate::core::tags::TagFilter;

/// A `path` or `path:line` selector, as written in rerun files.
/// `path` 或 `path:line` 选择器，与重跑文件中的写法一致。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScenarioLocation {
    pub path: String,
    /// `None` selects every scenario of the file.
    pub line: Option<u32>,
}

impl ScenarioLocation {
    pub fn new(path: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }

    /// Parses `path[:line[:line...]]` into one location per line.
    pub fn parse_many(text: &str) -> Result<Vec<ScenarioLocation>, ConfigError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ConfigError::Location(text.to_string()));
        }
        let mut parts: Vec<&str> = text.split(':').collect();
        let mut lines = Vec::new();
        while parts.len() > 1 {
            let Some(last) = parts.last() else { break };
            match last.parse::<u32>() {
                Ok(line) => {
                    lines.push(line);
                    parts.pop();
                }
                Err(_) => break,
            }
        }
        let path = parts.join(":");
        if path.is_empty() {
            return Err(ConfigError::Location(text.to_string()));
        }
        if lines.is_empty() {
            return Ok(vec![ScenarioLocation::new(path, None)]);
        }
        lines.reverse();
        Ok(lines
            .into_iter()
            .map(|line| ScenarioLocation::new(path.clone(), Some(line)))
            .collect())
    }

    fn matches(&self, path: &str, scenario: &Scenario) -> bool {
        if normalize_path(&self.path) != normalize_path(path) {
            return false;
        }
        match self.line {
            None => true,
            Some(line) => {
                scenario.line == line
                    || scenario
                        .origin
                        .as_ref()
                        .is_some_and(|origin| origin.outline_line == line)
            }
        }
    }
}

impl FromStr for ScenarioLocation {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut locations = Self::parse_many(text)?;
        if locations.len() != 1 {
            return Err(ConfigError::Location(text.to_string()));
        }
        Ok(locations.remove(0))
    }
}

impl fmt::Display for ScenarioLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.path, line),
            None => f.write_str(&self.path),
        }
    }
}

fn normalize_path(path: &str) -> &str {
    path.strip_prefix("./").unwrap_or(path)
}

/// Scenario selection predicates. All of them must hold for a scenario to
/// run; an empty predicate selects everything.
/// 场景选择谓词。场景必须满足所有谓词才能运行；空谓词选择所有内容。
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub tags: TagFilter,
    /// A scenario is selected when any pattern finds a match in its name.
    pub names: Vec<Regex>,
    /// A scenario is selected when any location matches it.
    pub locations: Vec<ScenarioLocation>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, path: &str, scenario: &Scenario, tags: &TagSet) -> bool {
        self.tags.matches(tags)
            && (self.names.is_empty() || self.names.iter().any(|name| name.is_match(&scenario.name)))
            && (self.locations.is_empty()
                || self
                    .locations
                    .iter()
                    .any(|location| location.matches(path, scenario)))
    }
}

/// One concrete scenario with its resolved execution policy.
#[derive(Debug, Clone)]
pub struct PlannedScenario<'a> {
    pub scenario: Cow<'a, Scenario>,
    pub id: ScenarioId,
    pub effective_tags: TagSet,
    pub selected: bool,
    pub continue_after_failed_step: bool,
    /// Total attempts allowed while the scenario keeps failing.
    pub max_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct PlannedRule<'a> {
    pub rule: &'a Rule,
    pub effective_tags: TagSet,
    pub scenarios: Vec<PlannedScenario<'a>>,
}

impl PlannedRule<'_> {
    pub fn is_selected(&self) -> bool {
        self.scenarios.iter().any(|scenario| scenario.selected)
    }
}

#[derive(Debug, Clone)]
pub enum PlannedChild<'a> {
    Scenario(PlannedScenario<'a>),
    Rule(PlannedRule<'a>),
}

#[derive(Debug, Clone)]
pub struct PlannedFeature<'a> {
    pub feature: &'a Feature,
    pub children: Vec<PlannedChild<'a>>,
}

impl<'a> PlannedFeature<'a> {
    pub fn is_selected(&self) -> bool {
        self.children.iter().any(|child| match child {
            PlannedChild::Scenario(scenario) => scenario.selected,
            PlannedChild::Rule(rule) => rule.is_selected(),
        })
    }

    pub fn scenarios(&self) -> impl Iterator<Item = &PlannedScenario<'a>> + '_ {
        self.children.iter().flat_map(|child| match child {
            PlannedChild::Scenario(scenario) => std::slice::from_ref(scenario).iter(),
            PlannedChild::Rule(rule) => rule.scenarios.iter(),
        })
    }
}

/// Represents a complete execution plan for a suite.
/// 表示套件的完整执行计划。
#[derive(Debug, Clone)]
pub struct ExecutionPlan<'a> {
    pub features: Vec<PlannedFeature<'a>>,
}

impl ExecutionPlan<'_> {
    pub fn scenario_count(&self) -> usize {
        self.features.iter().map(|feature| feature.scenarios().count()).sum()
    }

    pub fn selected_count(&self) -> usize {
        self.features
            .iter()
            .flat_map(PlannedFeature::scenarios)
            .filter(|scenario| scenario.selected)
            .count()
    }
}

/// Creates an execution plan for every feature of `suite`.
pub fn plan_execution<'a>(suite: &'a Suite, options: &RunOptions) -> ExecutionPlan<'a> {
    ExecutionPlan {
        features: suite
            .features
            .iter()
            .map(|feature| plan_feature(feature, options))
            .collect(),
    }
}

/// Plans a single feature: expands outlines and resolves selection and
/// policy for each concrete scenario in document order.
pub fn plan_feature<'a>(feature: &'a Feature, options: &RunOptions) -> PlannedFeature<'a> {
    let mut children = Vec::new();
    for child in &feature.children {
        match child {
            FeatureChild::Scenario(scenario) => children.push(PlannedChild::Scenario(plan_scenario(
                feature,
                None,
                Cow::Borrowed(scenario),
                options,
            ))),
            FeatureChild::Outline(outline) => children.extend(
                outline
                    .expand()
                    .into_iter()
                    .map(|scenario| PlannedChild::Scenario(plan_scenario(feature, None, Cow::Owned(scenario), options))),
            ),
            FeatureChild::Rule(rule) => children.push(PlannedChild::Rule(plan_rule(feature, rule, options))),
        }
    }
    PlannedFeature { feature, children }
}

fn plan_rule<'a>(feature: &'a Feature, rule: &'a Rule, options: &RunOptions) -> PlannedRule<'a> {
    let scenarios = rule
        .children
        .iter()
        .flat_map(ScenarioDefinition::scenarios)
        .map(|scenario| plan_scenario(feature, Some(rule), scenario, options))
        .collect();
    PlannedRule {
        rule,
        effective_tags: effective_tags([&feature.tags, &rule.tags]),
        scenarios,
    }
}

fn plan_scenario<'a>(
    feature: &'a Feature,
    rule: Option<&'a Rule>,
    scenario: Cow<'a, Scenario>,
    options: &RunOptions,
) -> PlannedScenario<'a> {
    let lineage = std::iter::once(&feature.tags)
        .chain(rule.map(|rule| &rule.tags))
        .chain(std::iter::once(&scenario.tags));
    let tags = effective_tags(lineage);
    let selected = options.selection.matches(&feature.path, &scenario, &tags);
    let continue_after_failed_step = options
        .continue_after_failed_step
        .as_ref()
        .is_some_and(|expression| expression.evaluate(&tags));
    let max_attempts = options
        .retry
        .as_ref()
        .filter(|policy| policy.tags.matches(&tags))
        .map_or(1, |policy| policy.max_attempts);
    PlannedScenario {
        id: ScenarioId {
            path: feature.path.clone(),
            line: scenario.line,
            name: scenario.name.clone(),
        },
        scenario,
        effective_tags: tags,
        selected,
        continue_after_failed_step,
        max_attempts,
    }
}
