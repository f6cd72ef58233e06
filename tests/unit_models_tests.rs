//! # Models Module Unit Tests / 模型模块单元测试
//!
//! This module contains unit tests for status aggregation, scenario identities
//! and the per-level summary counters.
//!
//! 此模块包含状态聚合、场景标识和各层级摘要计数器的单元测试。

mod common;

use common::*;
use gherkin_runner::core::config::RunOptions;
use gherkin_runner::core::document::{Background, Feature, Rule, Scenario};
use gherkin_runner::core::hooks::Hooks;
use gherkin_runner::core::models::{ScenarioId, StatusCounts};
use gherkin_runner::core::planner::Selection;
use gherkin_runner::core::tags::TagFilter;
use gherkin_runner::{Runner, Status};

#[cfg(test)]
mod status_tests {
    use super::*;

    #[test]
    fn test_rollup_uses_aggregation_order() {
        assert_eq!(Status::rollup([Status::Passed, Status::Skipped]), Status::Passed);
        assert_eq!(Status::rollup([Status::Passed, Status::Undefined]), Status::Undefined);
        assert_eq!(Status::rollup([Status::Undefined, Status::Error]), Status::Error);
        assert_eq!(Status::rollup([Status::Error, Status::Failed, Status::Passed]), Status::Failed);
        assert_eq!(Status::rollup([Status::Untested, Status::Skipped]), Status::Skipped);
        assert_eq!(Status::rollup([]), Status::Untested);
    }

    #[test]
    fn test_success_and_failure_classification() {
        for status in [Status::Untested, Status::Skipped, Status::Passed] {
            assert!(status.is_success(), "{status} should count as success");
            assert!(!status.is_failure());
        }
        assert!(!Status::Undefined.is_success());
        assert!(!Status::Undefined.is_failure());
        assert!(Status::Error.is_failure());
        assert!(Status::Failed.is_failure());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Status::Undefined).unwrap(), "\"undefined\"");
        assert_eq!(Status::Failed.to_string(), "failed");
    }

    #[test]
    fn test_scenario_id_displays_as_location() {
        let id = ScenarioId {
            path: "features/login.feature".to_string(),
            line: 12,
            name: "Wrong password".to_string(),
        };
        assert_eq!(id.to_string(), "features/login.feature:12");
    }

    #[test]
    fn test_status_counts_total() {
        let mut counts = StatusCounts::default();
        for status in [Status::Passed, Status::Passed, Status::Failed, Status::Untested] {
            counts.record(status);
        }
        assert_eq!(counts.passed, 2);
        assert_eq!(counts.get(Status::Failed), 1);
        assert_eq!(counts.total(), 4);
    }
}

#[cfg(test)]
mod summary_tests {
    use super::*;

    fn run(feature: Feature, options: RunOptions) -> gherkin_runner::RunResult {
        Runner::new(arithmetic_registry(), Hooks::new(), options)
            .run(&single_feature_suite(feature))
            .unwrap()
    }

    #[test]
    fn test_background_steps_are_counted_once_per_feature() {
        let feature = Feature::new("F")
            .background(Background::new().given("a passing step").and("a passing step"))
            .scenario(Scenario::new("one").then("a passing step"))
            .scenario(Scenario::new("two").then("a passing step"));
        let result = run(feature, RunOptions::default());

        assert_eq!(result.scenarios().map(|scenario| scenario.steps.len()).sum::<usize>(), 6);
        let summary = result.summary();
        assert_eq!(summary.steps.passed, 4);
        assert_eq!(summary.scenarios.passed, 2);
        assert_eq!(summary.features.passed, 1);
        assert_eq!(result.features[0].background.len(), 2);
    }

    #[test]
    fn test_background_of_skipped_first_scenario_is_not_counted() {
        let feature = Feature::new("F")
            .background(Background::new().given("a passing step"))
            .scenario(Scenario::new("skipped").tag("wip").then("a passing step"))
            .scenario(Scenario::new("runs").then("a passing step"));
        let options = RunOptions {
            selection: Selection {
                tags: TagFilter::parse_all(["not @wip"]).unwrap(),
                ..Selection::all()
            },
            ..RunOptions::default()
        };
        let summary = run(feature, options).summary();
        assert_eq!(summary.steps.skipped, 1);
        assert_eq!(summary.steps.passed, 2);
        assert_eq!(summary.scenarios.skipped, 1);
    }

    #[test]
    fn test_rules_are_counted_separately() {
        let feature = Feature::new("F")
            .rule(Rule::new("first").scenario(passing_scenario("a", 3)))
            .rule(Rule::new("second").scenario(failing_scenario("b", 8)));
        let summary = run(feature, RunOptions::default()).summary();
        assert_eq!(summary.rules.passed, 1);
        assert_eq!(summary.rules.failed, 1);
        assert_eq!(summary.scenarios.total(), 2);
        assert_eq!(summary.features.failed, 1);
    }

    #[test]
    fn test_failed_step_counts() {
        let summary = run(Feature::new("F").scenario(failing_scenario("S", 3)), RunOptions::default()).summary();
        assert_eq!(summary.steps.passed, 1);
        assert_eq!(summary.steps.failed, 1);
        assert_eq!(summary.steps.skipped, 1);
    }
}
