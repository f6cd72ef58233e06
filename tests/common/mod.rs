// Shared test helpers for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::bail;
use gherkin_runner::core::hooks::{HookEvent, HookPoint, Hooks};
use gherkin_runner::{Context, Feature, Scenario, StepRegistry, Suite};
use tempfile::{TempDir, tempdir};

/// Ordered record of hook invocations, e.g. `before_scenario:Login`.
pub type HookLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> HookLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &HookLog) -> Vec<String> {
    log.lock().expect("hook log poisoned").clone()
}

fn record(log: &HookLog, event: &HookEvent<'_>) {
    let entry = match event.point {
        HookPoint::BeforeAll | HookPoint::AfterAll => event.point.to_string(),
        point => format!("{}:{}", point, event.name()),
    };
    log.lock().expect("hook log poisoned").push(entry);
}

/// Hooks recording every invocation into `log`. A hook whose entry equals
/// one of `failing` returns an error after recording itself.
pub fn recording_hooks(log: &HookLog, failing: &[&str]) -> Hooks {
    let mut hooks = Hooks::new();
    let failing: Arc<Vec<String>> = Arc::new(failing.iter().map(|entry| entry.to_string()).collect());
    for point in [
        HookPoint::BeforeAll,
        HookPoint::AfterAll,
        HookPoint::BeforeFeature,
        HookPoint::AfterFeature,
        HookPoint::BeforeRule,
        HookPoint::AfterRule,
        HookPoint::BeforeScenario,
        HookPoint::AfterScenario,
        HookPoint::BeforeStep,
        HookPoint::AfterStep,
        HookPoint::BeforeTag,
        HookPoint::AfterTag,
    ] {
        let log = Arc::clone(log);
        let failing = Arc::clone(&failing);
        hooks.register(point, move |_context, event| {
            record(&log, event);
            let entry = entries(&log).last().cloned().unwrap_or_default();
            if failing.contains(&entry) {
                bail!("injected failure in {entry}");
            }
            Ok(())
        });
    }
    hooks
}

/// Registry with a small arithmetic vocabulary:
/// `a={n:int}`, `compute`, `the result is {n:int}`, `a failing step`,
/// `a panicking step`, `a passing step`.
pub fn arithmetic_registry() -> StepRegistry {
    let mut registry = StepRegistry::new();
    registry
        .given("a={n:int}", |context, step| {
            context.set("a", step.arg::<i64>("n")?)?;
            Ok(())
        })
        .expect("valid pattern");
    registry
        .when("compute", |context, _step| {
            let a = *context.get::<i64>("a").unwrap_or(&0);
            context.set("result", a + 2)?;
            Ok(())
        })
        .expect("valid pattern");
    registry
        .then("the result is {n:int}", |context, step| {
            let expected = step.arg::<i64>("n")?;
            let actual = *context.get::<i64>("result").unwrap_or(&0);
            if actual != expected {
                bail!("expected {expected}, got {actual}");
            }
            Ok(())
        })
        .expect("valid pattern");
    registry
        .step("a passing step", |_context, _step| Ok(()))
        .expect("valid pattern");
    registry
        .step("a failing step", |_context, _step| bail!("deliberate failure"))
        .expect("valid pattern");
    registry
        .step("a panicking step", |_context, _step| panic!("deliberate panic"))
        .expect("valid pattern");
    registry
}

pub fn passing_scenario(name: &str, line: u32) -> Scenario {
    Scenario::new(name)
        .at_line(line)
        .given("a passing step")
        .then("a passing step")
}

pub fn failing_scenario(name: &str, line: u32) -> Scenario {
    Scenario::new(name)
        .at_line(line)
        .given("a passing step")
        .when("a failing step")
        .then("a passing step")
}

pub fn single_feature_suite(feature: Feature) -> Suite {
    Suite::new(vec![feature])
}

/// Step texts of the first scenario of the first feature with their status.
pub fn step_statuses(result: &gherkin_runner::RunResult) -> Vec<(String, gherkin_runner::Status)> {
    result
        .scenarios()
        .next()
        .map(|scenario| {
            scenario
                .steps
                .iter()
                .map(|step| (step.text.clone(), step.status))
                .collect()
        })
        .unwrap_or_default()
}

pub fn setup_test_environment() -> TempDir {
    tempdir().expect("Failed to create temporary directory")
}

/// Helper function to write a runner configuration file
pub fn write_config(temp_dir: &TempDir, content: &str) -> PathBuf {
    let path = temp_dir.path().join("runner.toml");
    fs::write(&path, content).expect("Failed to write runner.toml");
    path
}

/// Convenience for tests that need a context outside a run.
pub fn fresh_context() -> Context {
    Context::new()
}
