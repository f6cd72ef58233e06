//! # Test Execution Engine Module / 测试执行引擎模块
//!
//! This module walks the document tree and drives the lifecycle of every
//! scope: suite → feature → rule → scenario → step. Each scope that is
//! entered runs its `before_*` hooks (tag hooks first), its body, and then its
//! `after_*` hooks, which fire even when the body or the `before_*` hook
//! failed. Unselected or cancelled scopes are recorded as `skipped` without
//! invoking any hook.
//!
//! Sequential runs execute on the calling thread. [`Runner::run_parallel`]
//! spreads whole features over blocking workers; scenarios of one feature
//! always run in document order on a single worker.
//!
//! 此模块遍历文档树并驱动每个作用域的生命周期：套件 → 功能 → 规则 → 场景 → 步骤。
//! 每个已进入的作用域先运行 `before_*` 钩子，然后运行主体，最后运行 `after_*` 钩子，
//! 即使主体或 `before_*` 钩子失败，`after_*` 钩子也会执行。

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::config::RunOptions;
use crate::core::context::{Context, ScopeLevel};
use crate::core::document::{Background, Feature, KeywordClass, Scenario, Step, Suite, TagSet};
use crate::core::errors::{FatalRunError, HookExecutionError, RunError, StepExecutionError, UndefinedStepError};
use crate::core::hooks::{HookEvent, HookPoint, HookScope, Hooks, call_guarded};
use crate::core::models::{
    Captured, ChildResult, FeatureResult, RuleResult, RunResult, ScenarioResult, Status, StepResult,
    UndefinedStep,
};
use crate::core::patterns::suggest_pattern;
use crate::core::planner::{PlannedChild, PlannedFeature, PlannedRule, PlannedScenario, plan_feature};
use crate::core::registry::StepRegistry;
use crate::infra::capture::capture_log;

/// Executes suites against a step registry and a set of hooks.
/// 针对步骤注册表和钩子集合执行套件。
pub struct Runner {
    registry: Arc<StepRegistry>,
    hooks: Arc<Hooks>,
    options: Arc<RunOptions>,
    stop: CancellationToken,
}

impl Runner {
    pub fn new(registry: StepRegistry, hooks: Hooks, options: RunOptions) -> Self {
        Self::from_shared(Arc::new(registry), Arc::new(hooks), Arc::new(options))
    }

    pub fn from_shared(registry: Arc<StepRegistry>, hooks: Arc<Hooks>, options: Arc<RunOptions>) -> Self {
        Self {
            registry,
            hooks,
            options,
            stop: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// External stop signal. Cancelling it stops new scopes from starting;
    /// scopes already entered still run their `after_*` hooks.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    fn executor(&self) -> ScopeExecutor {
        ScopeExecutor {
            registry: Arc::clone(&self.registry),
            hooks: Arc::clone(&self.hooks),
            options: Arc::clone(&self.options),
            stop: self.stop.child_token(),
        }
    }

    /// Runs every feature of `suite` sequentially, in document order.
    ///
    /// # Errors
    /// - [`RunError::Invariant`] when the document is malformed (nothing runs)
    /// - [`RunError::Fatal`] when `before_all` or `after_all` fails; the
    ///   partial result is attached
    pub fn run(&self, suite: &Suite) -> Result<RunResult, RunError> {
        suite.validate()?;
        let executor = self.executor();
        let clock = Instant::now();
        let mut result = RunResult::new(Utc::now());
        let mut context = Context::new();
        context.push(ScopeLevel::Suite);
        info!(features = suite.features.len(), "starting run");

        let fatal = executor.before_all(&mut context, &mut result);
        for feature in &suite.features {
            let planned = plan_feature(feature, &self.options);
            let feature_result = if fatal.is_some() {
                skip_feature(&planned)
            } else {
                executor.run_feature(&mut context, &planned)
            };
            result.features.push(feature_result);
        }
        executor.finish(&mut context, result, fatal, clock)
    }

    /// Runs features concurrently on up to `jobs` blocking workers. Each
    /// worker gets a snapshot of the suite context taken after `before_all`;
    /// results are reported in document order.
    ///
    /// 在最多 `jobs` 个阻塞工作线程上并发运行功能。结果按文档顺序报告。
    pub async fn run_parallel(&self, suite: Arc<Suite>) -> Result<RunResult, RunError> {
        suite.validate()?;
        let executor = self.executor();
        let clock = Instant::now();
        let mut result = RunResult::new(Utc::now());
        let mut context = Context::new();
        context.push(ScopeLevel::Suite);
        let jobs = self.options.jobs.max(1);
        info!(features = suite.features.len(), jobs, "starting parallel run");

        let fatal = executor.before_all(&mut context, &mut result);
        let skip_all = fatal.is_some();
        let shared_context = &context;
        let mut features: Vec<(usize, FeatureResult)> =
            stream::iter((0..suite.features.len()).map(|index| {
                let executor = executor.clone();
                let suite = Arc::clone(&suite);
                let mut worker_context = shared_context.fork();
                async move {
                    let worker_suite = Arc::clone(&suite);
                    let worker = executor.clone();
                    let handle = tokio::task::spawn_blocking(move || {
                        let planned = plan_feature(&worker_suite.features[index], &worker.options);
                        if skip_all {
                            skip_feature(&planned)
                        } else {
                            worker.run_feature(&mut worker_context, &planned)
                        }
                    });
                    let feature_result = match handle.await {
                        Ok(feature_result) => feature_result,
                        Err(join_error) => {
                            warn!(feature = %suite.features[index].name, error = %join_error, "feature worker crashed");
                            crashed_feature(&suite.features[index], join_error.to_string())
                        }
                    };
                    (index, feature_result)
                }
            }))
            .buffer_unordered(jobs)
            .collect()
            .await;

        features.sort_by_key(|(index, _)| *index);
        result.features = features.into_iter().map(|(_, feature)| feature).collect();
        executor.finish(&mut context, result, fatal, clock)
    }
}

/// Hook failures recorded against one scope.
#[derive(Debug, Default)]
struct HookFailures {
    messages: Vec<String>,
    failed: bool,
}

impl HookFailures {
    /// Records `outcome`; returns whether the scope may proceed.
    fn record(&mut self, outcome: Result<(), HookExecutionError>) -> bool {
        match outcome {
            Ok(()) => true,
            Err(error) => {
                self.failed |= !error.stop_requested;
                self.messages.push(error.to_string());
                false
            }
        }
    }

    fn message(&self) -> Option<String> {
        (!self.messages.is_empty()).then(|| self.messages.join("\n"))
    }
}

/// How far the `before_*` sequence of a scope got.
#[derive(Debug, Clone, Copy, Default)]
struct Entered {
    /// Number of own tags whose `before_tag` was invoked.
    tags: usize,
    /// `before_<level>` was invoked.
    level: bool,
}

#[derive(Clone)]
struct ScopeExecutor {
    registry: Arc<StepRegistry>,
    hooks: Arc<Hooks>,
    options: Arc<RunOptions>,
    stop: CancellationToken,
}

impl ScopeExecutor {
    fn cancelled(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Runs `f` with log capture and moves everything it produced into `sink`.
    fn captured<R>(&self, context: &mut Context, sink: &mut Captured, f: impl FnOnce(&mut Context) -> R) -> R {
        let (outcome, log) = capture_log(|| f(&mut *context));
        let (stdout, stderr) = context.take_output();
        sink.append(Captured { stdout, stderr, log });
        outcome
    }

    fn hook(
        &self,
        context: &mut Context,
        sink: &mut Captured,
        point: HookPoint,
        scope: HookScope<'_>,
        status: Option<Status>,
    ) -> Result<(), HookExecutionError> {
        if self.options.dry_run {
            return Ok(());
        }
        let event = HookEvent { point, scope, status };
        let outcome = self.captured(context, sink, |context| self.hooks.invoke(context, &event));
        if let Err(error) = &outcome {
            if error.stop_requested {
                warn!(hook = %point, "stop requested from hook");
                self.stop.cancel();
            } else {
                warn!(hook = %point, error = %error.message, "hook failed");
            }
        }
        outcome
    }

    /// `before_tag` for each own tag, then `before_<level>`; stops at the
    /// first failure.
    fn enter(
        &self,
        context: &mut Context,
        sink: &mut Captured,
        failures: &mut HookFailures,
        tags: &TagSet,
        point: HookPoint,
        scope: HookScope<'_>,
    ) -> (Entered, bool) {
        let mut entered = Entered::default();
        for tag in tags {
            entered.tags += 1;
            let outcome = self.hook(context, sink, HookPoint::BeforeTag, HookScope::Tag(&tag.name), None);
            if !failures.record(outcome) {
                return (entered, false);
            }
        }
        entered.level = true;
        let proceed = failures.record(self.hook(context, sink, point, scope, None));
        (entered, proceed)
    }

    /// Mirror of [`Self::enter`]: `after_<level>` if its `before` ran, then
    /// `after_tag` for every entered tag in reverse order.
    #[allow(clippy::too_many_arguments)]
    fn exit(
        &self,
        context: &mut Context,
        sink: &mut Captured,
        failures: &mut HookFailures,
        entered: Entered,
        tags: &TagSet,
        point: HookPoint,
        scope: HookScope<'_>,
        status: Status,
    ) {
        if entered.level {
            failures.record(self.hook(context, sink, point, scope, Some(status)));
        }
        let entered_tags: Vec<_> = tags.iter().take(entered.tags).collect();
        for tag in entered_tags.into_iter().rev() {
            let outcome = self.hook(context, sink, HookPoint::AfterTag, HookScope::Tag(&tag.name), Some(status));
            failures.record(outcome);
        }
    }

    /// Returns the `before_all` failure when it is fatal.
    fn before_all(&self, context: &mut Context, result: &mut RunResult) -> Option<HookExecutionError> {
        match self.hook(context, &mut result.captured, HookPoint::BeforeAll, HookScope::Suite, None) {
            Ok(()) => None,
            Err(error) => {
                result.error_message = Some(error.to_string());
                (!error.stop_requested).then_some(error)
            }
        }
    }

    fn finish(
        &self,
        context: &mut Context,
        mut result: RunResult,
        fatal: Option<HookExecutionError>,
        clock: Instant,
    ) -> Result<RunResult, RunError> {
        let mut fatal = fatal;
        let provisional = Status::rollup(result.features.iter().map(|feature| feature.status));
        let after = self.hook(
            context,
            &mut result.captured,
            HookPoint::AfterAll,
            HookScope::Suite,
            Some(provisional),
        );
        if let Err(error) = after {
            result.error_message = Some(match result.error_message.take() {
                Some(previous) => format!("{previous}\n{error}"),
                None => error.to_string(),
            });
            if !error.stop_requested && fatal.is_none() {
                fatal = Some(error);
            }
        }
        context.pop();

        result.duration = clock.elapsed();
        result.cancelled = self.cancelled();
        result.undefined = collect_undefined(&result.features);
        result.finalize(fatal.is_some());
        if result.cancelled {
            warn!("run was cancelled before completion");
        }
        info!(status = %result.status, duration = ?result.duration, "run finished");

        match fatal {
            Some(error) => Err(FatalRunError {
                hook: error.hook,
                message: error.message,
                result: Box::new(result),
            }
            .into()),
            None => Ok(result),
        }
    }

    fn run_feature(&self, context: &mut Context, planned: &PlannedFeature<'_>) -> FeatureResult {
        if !planned.is_selected() || self.cancelled() {
            return skip_feature(planned);
        }
        let feature = planned.feature;
        let clock = Instant::now();
        let mut result = feature_shell(feature);
        debug!(feature = %feature.name, path = %feature.path, "entering feature");

        context.push(ScopeLevel::Feature);
        context.set_runner("feature", feature.name.clone());
        let mut failures = HookFailures::default();
        let (entered, proceed) = self.enter(
            context,
            &mut result.captured,
            &mut failures,
            &feature.tags,
            HookPoint::BeforeFeature,
            HookScope::Feature(feature),
        );

        let backgrounds: Vec<&Background> = feature.background.iter().collect();
        for child in &planned.children {
            let child_result = match child {
                PlannedChild::Scenario(scenario) if proceed => {
                    ChildResult::Scenario(self.run_scenario(context, scenario, &backgrounds))
                }
                PlannedChild::Scenario(scenario) => ChildResult::Scenario(skip_scenario(scenario, &backgrounds)),
                PlannedChild::Rule(rule) if proceed => ChildResult::Rule(self.run_rule(context, rule, &backgrounds)),
                PlannedChild::Rule(rule) => ChildResult::Rule(skip_rule(rule, &backgrounds)),
            };
            result.children.push(child_result);
        }

        let status = rolled_up(result.children.iter().map(ChildResult::status), &failures);
        self.exit(
            context,
            &mut result.captured,
            &mut failures,
            entered,
            &feature.tags,
            HookPoint::AfterFeature,
            HookScope::Feature(feature),
            status,
        );
        context.pop();

        result.status = rolled_up(result.children.iter().map(ChildResult::status), &failures);
        result.error_message = failures.message();
        let background: Vec<StepResult> = result
            .scenarios()
            .find(|scenario| scenario.attempts > 0)
            .map(|scenario| scenario.steps.iter().filter(|step| step.background).cloned().collect())
            .unwrap_or_default();
        result.background = background;
        result.duration = clock.elapsed();
        info!(feature = %feature.name, status = %result.status, "feature finished");
        result
    }

    fn run_rule(&self, context: &mut Context, planned: &PlannedRule<'_>, backgrounds: &[&Background]) -> RuleResult {
        let mut backgrounds = backgrounds.to_vec();
        backgrounds.extend(planned.rule.background.iter());
        if !planned.is_selected() || self.cancelled() {
            return skip_rule(planned, &backgrounds);
        }
        let rule = planned.rule;
        let clock = Instant::now();
        let mut result = rule_shell(planned);
        debug!(rule = %rule.name, "entering rule");

        context.push(ScopeLevel::Rule);
        context.set_runner("rule", rule.name.clone());
        let mut failures = HookFailures::default();
        let (entered, proceed) = self.enter(
            context,
            &mut result.captured,
            &mut failures,
            &rule.tags,
            HookPoint::BeforeRule,
            HookScope::Rule(rule),
        );

        for scenario in &planned.scenarios {
            let scenario_result = if proceed {
                self.run_scenario(context, scenario, &backgrounds)
            } else {
                skip_scenario(scenario, &backgrounds)
            };
            result.scenarios.push(scenario_result);
        }

        let status = rolled_up(result.scenarios.iter().map(|scenario| scenario.status), &failures);
        self.exit(
            context,
            &mut result.captured,
            &mut failures,
            entered,
            &rule.tags,
            HookPoint::AfterRule,
            HookScope::Rule(rule),
            status,
        );
        context.pop();

        result.status = rolled_up(result.scenarios.iter().map(|scenario| scenario.status), &failures);
        result.error_message = failures.message();
        result.duration = clock.elapsed();
        result
    }

    /// Runs a scenario, retrying while it fails and attempts remain.
    fn run_scenario(
        &self,
        context: &mut Context,
        planned: &PlannedScenario<'_>,
        backgrounds: &[&Background],
    ) -> ScenarioResult {
        if !planned.selected || self.cancelled() {
            return skip_scenario(planned, backgrounds);
        }
        let mut attempt = 0;
        let mut result = loop {
            attempt += 1;
            let result = self.run_scenario_once(context, planned, backgrounds);
            if !result.status.is_failure() || attempt >= planned.max_attempts || self.cancelled() {
                break result;
            }
            info!(
                scenario = %planned.scenario.name,
                attempt,
                max_attempts = planned.max_attempts,
                "retrying failed scenario"
            );
        };
        result.attempts = attempt;
        if result.status.is_failure() && self.options.stop_on_failure {
            warn!(scenario = %planned.id, "stopping after first failure");
            self.stop.cancel();
        }
        result
    }

    fn run_scenario_once(
        &self,
        context: &mut Context,
        planned: &PlannedScenario<'_>,
        backgrounds: &[&Background],
    ) -> ScenarioResult {
        let scenario: &Scenario = &planned.scenario;
        let clock = Instant::now();
        let mut result = scenario_shell(planned);
        debug!(scenario = %scenario.name, id = %planned.id, "entering scenario");

        context.push(ScopeLevel::Scenario);
        context.set_runner("scenario", scenario.name.clone());
        context.set_runner(
            "tags",
            planned
                .effective_tags
                .iter()
                .map(|tag| tag.name.clone())
                .collect::<Vec<String>>(),
        );
        context.reset_control(planned.continue_after_failed_step);
        let mut failures = HookFailures::default();
        let (entered, proceed) = self.enter(
            context,
            &mut result.captured,
            &mut failures,
            &scenario.tags,
            HookPoint::BeforeScenario,
            HookScope::Scenario(scenario),
        );
        let skip_reason = context.control().skip_reason.clone();
        let continue_after_failed_step = context.control().continue_after_failed_step;
        let run_body = proceed && skip_reason.is_none();

        let mut halted = !run_body;
        for (step, background) in scenario_steps(backgrounds, scenario) {
            if halted || self.cancelled() {
                result.steps.push(skipped_step(step, background));
                continue;
            }
            let step_result = self.run_step(context, step, background);
            halted = match step_result.status {
                Status::Failed => !continue_after_failed_step,
                Status::Undefined | Status::Error => true,
                _ => false,
            };
            result.steps.push(step_result);
        }

        let body_status = if skip_reason.is_some() {
            Status::Skipped
        } else if result.steps.is_empty() && run_body {
            if self.options.dry_run { Status::Untested } else { Status::Passed }
        } else {
            Status::rollup(result.steps.iter().map(|step| step.status))
        };
        let status = with_hook_failures(body_status, &failures);
        self.exit(
            context,
            &mut result.captured,
            &mut failures,
            entered,
            &scenario.tags,
            HookPoint::AfterScenario,
            HookScope::Scenario(scenario),
            status,
        );
        context.pop();

        result.status = with_hook_failures(body_status, &failures);
        result.error_message = match (failures.message(), skip_reason) {
            (Some(hooks), _) => Some(hooks),
            (None, reason) => reason,
        };
        result.duration = clock.elapsed();
        debug!(scenario = %scenario.name, status = %result.status, "scenario finished");
        result
    }

    fn run_step(&self, context: &mut Context, step: &Step, background: bool) -> StepResult {
        let clock = Instant::now();
        let mut result = skipped_step(step, background);
        match self.registry.find_match(step) {
            Err(error) => {
                result.status = Status::Error;
                result.error_message = Some(error.to_string());
            }
            Ok(None) => {
                result.status = Status::Undefined;
                result.error_message = Some(
                    UndefinedStepError {
                        keyword: step.keyword.clone(),
                        text: step.text.clone(),
                    }
                    .to_string(),
                );
            }
            Ok(Some(matched)) if self.options.dry_run => {
                result.status = Status::Untested;
                result.matched = Some(matched);
            }
            Ok(Some(matched)) => {
                let mut failures = HookFailures::default();
                let mut message = None;
                let before = self.hook(context, &mut result.captured, HookPoint::BeforeStep, HookScope::Step(step), None);
                result.status = if !failures.record(before) {
                    if failures.failed { Status::Error } else { Status::Skipped }
                } else {
                    let registry = &self.registry;
                    let outcome = self.captured(context, &mut result.captured, |context| {
                        call_guarded(|| registry.invoke(&matched, context, step)).map_err(|failure| {
                            StepExecutionError {
                                message: failure.message,
                                stop_requested: failure.stop_requested,
                            }
                        })
                    });
                    match outcome {
                        Ok(()) => Status::Passed,
                        Err(error) if error.stop_requested => {
                            warn!(step = %step.text, "stop requested from step");
                            self.stop.cancel();
                            message = Some(error.to_string());
                            Status::Skipped
                        }
                        Err(error) => {
                            message = Some(error.to_string());
                            Status::Failed
                        }
                    }
                };
                let after = self.hook(
                    context,
                    &mut result.captured,
                    HookPoint::AfterStep,
                    HookScope::Step(step),
                    Some(result.status),
                );
                failures.record(after);

                result.status = with_hook_failures(result.status, &failures);
                result.error_message = match (message, failures.message()) {
                    (Some(step_error), Some(hooks)) => Some(format!("{step_error}\n{hooks}")),
                    (step_error, hooks) => step_error.or(hooks),
                };
                result.matched = Some(matched);
            }
        }
        result.duration = clock.elapsed();
        debug!(step = %step.text, status = %result.status, "step finished");
        result
    }
}

fn with_hook_failures(status: Status, failures: &HookFailures) -> Status {
    if failures.failed {
        status.max(Status::Error)
    } else {
        status
    }
}

fn rolled_up<I>(statuses: I, failures: &HookFailures) -> Status
where
    I: IntoIterator<Item = Status>,
{
    with_hook_failures(Status::rollup(statuses), failures)
}

/// Background steps (feature, then rule) followed by the scenario's own steps.
fn scenario_steps<'a>(backgrounds: &[&'a Background], scenario: &'a Scenario) -> Vec<(&'a Step, bool)> {
    backgrounds
        .iter()
        .flat_map(|background| background.steps.iter().map(|step| (step, true)))
        .chain(scenario.steps.iter().map(|step| (step, false)))
        .collect()
}

fn tag_names(tags: &TagSet) -> Vec<String> {
    tags.iter().map(|tag| tag.name.clone()).collect()
}

fn skipped_step(step: &Step, background: bool) -> StepResult {
    StepResult {
        keyword: step.keyword.clone(),
        step_type: step.step_type,
        text: step.text.clone(),
        line: step.line,
        status: Status::Skipped,
        duration: Duration::ZERO,
        error_message: None,
        matched: None,
        captured: Captured::default(),
        background,
    }
}

fn scenario_shell(planned: &PlannedScenario<'_>) -> ScenarioResult {
    ScenarioResult {
        id: planned.id.clone(),
        keyword: planned.scenario.keyword.clone(),
        name: planned.scenario.name.clone(),
        tags: tag_names(&planned.effective_tags),
        status: Status::Untested,
        duration: Duration::ZERO,
        error_message: None,
        captured: Captured::default(),
        steps: Vec::new(),
        attempts: 0,
    }
}

fn skip_scenario(planned: &PlannedScenario<'_>, backgrounds: &[&Background]) -> ScenarioResult {
    let mut result = scenario_shell(planned);
    result.status = Status::Skipped;
    result.steps = scenario_steps(backgrounds, &planned.scenario)
        .into_iter()
        .map(|(step, background)| skipped_step(step, background))
        .collect();
    result
}

fn rule_shell(planned: &PlannedRule<'_>) -> RuleResult {
    RuleResult {
        keyword: planned.rule.keyword.clone(),
        name: planned.rule.name.clone(),
        tags: tag_names(&planned.rule.tags),
        line: planned.rule.line,
        status: Status::Untested,
        duration: Duration::ZERO,
        error_message: None,
        captured: Captured::default(),
        scenarios: Vec::new(),
    }
}

fn skip_rule(planned: &PlannedRule<'_>, backgrounds: &[&Background]) -> RuleResult {
    let mut result = rule_shell(planned);
    result.status = Status::Skipped;
    result.scenarios = planned
        .scenarios
        .iter()
        .map(|scenario| skip_scenario(scenario, backgrounds))
        .collect();
    result
}

fn feature_shell(feature: &Feature) -> FeatureResult {
    FeatureResult {
        keyword: feature.keyword.clone(),
        name: feature.name.clone(),
        path: feature.path.clone(),
        tags: tag_names(&feature.tags),
        line: feature.line,
        status: Status::Untested,
        duration: Duration::ZERO,
        error_message: None,
        captured: Captured::default(),
        background: Vec::new(),
        children: Vec::new(),
    }
}

fn skip_feature(planned: &PlannedFeature<'_>) -> FeatureResult {
    let feature = planned.feature;
    let mut result = feature_shell(feature);
    result.status = Status::Skipped;
    let backgrounds: Vec<&Background> = feature.background.iter().collect();
    result.children = planned
        .children
        .iter()
        .map(|child| match child {
            PlannedChild::Scenario(scenario) => ChildResult::Scenario(skip_scenario(scenario, &backgrounds)),
            PlannedChild::Rule(rule) => {
                let mut rule_backgrounds = backgrounds.clone();
                rule_backgrounds.extend(rule.rule.background.iter());
                ChildResult::Rule(skip_rule(rule, &rule_backgrounds))
            }
        })
        .collect();
    result
}

fn crashed_feature(feature: &Feature, message: String) -> FeatureResult {
    let mut result = feature_shell(feature);
    result.status = Status::Error;
    result.error_message = Some(message);
    result
}

/// Every undefined step of the run, once per source location, with a
/// registration snippet.
fn collect_undefined(features: &[FeatureResult]) -> Vec<UndefinedStep> {
    let mut seen = BTreeSet::new();
    let mut undefined = Vec::new();
    for feature in features {
        for step in feature.scenarios().flat_map(|scenario| scenario.steps.iter()) {
            if step.status != Status::Undefined || !seen.insert((feature.path.as_str(), step.line, step.text.as_str())) {
                continue;
            }
            undefined.push(UndefinedStep {
                path: feature.path.clone(),
                line: step.line,
                keyword: step.keyword.clone(),
                text: step.text.clone(),
                snippet: render_snippet(step),
            });
        }
    }
    undefined
}

fn render_snippet(step: &StepResult) -> String {
    let method = match step.step_type {
        Some(KeywordClass::Context) => "given",
        Some(KeywordClass::Action) => "when",
        Some(KeywordClass::Outcome) => "then",
        _ => "step",
    };
    format!(
        "registry.{method}(r#\"{pattern}\"#, |context, step| {{\n    anyhow::bail!(r#\"step not implemented: {keyword} {text}\"#)\n}})?;",
        pattern = suggest_pattern(&step.text),
        keyword = step.keyword,
        text = step.text,
    )
}
