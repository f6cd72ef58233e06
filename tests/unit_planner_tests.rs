//! # Planner Module Unit Tests / 计划器模块单元测试
//!
//! This module contains unit tests for execution planning: outline
//! expansion, tag inheritance, selection and per-scenario policies.
//!
//! 此模块包含执行计划的单元测试：大纲展开、标签继承、选择以及每个场景的策略。

use gherkin_runner::core::config::{RetryPolicy, RunOptions};
use gherkin_runner::core::document::{Examples, Feature, Rule, Scenario, ScenarioOutline, Suite, Table};
use gherkin_runner::core::planner::{PlannedChild, Selection, plan_execution, plan_feature};
use gherkin_runner::core::tags::{TagExpression, TagFilter};

fn catalog() -> Feature {
    Feature::new("Catalog")
        .at_path("features/catalog.feature")
        .tag("shop")
        .scenario(Scenario::new("browse").at_line(4).tag("smoke").given("a product"))
        .outline(
            ScenarioOutline::new("price of <item>")
                .at_line(8)
                .given("a <item>")
                .examples(Examples::new(Table::new(["item"]).at_line(12).row(["apple"]).row(["pear"]))),
        )
        .rule(
            Rule::new("discounts")
                .tag("money")
                .scenario(Scenario::new("coupon").at_line(20).tag("flaky").given("a coupon")),
        )
}

#[cfg(test)]
mod plan_tests {
    use super::*;

    #[test]
    fn test_plan_expands_outlines_in_document_order() {
        let feature = catalog();
        let planned = plan_feature(&feature, &RunOptions::default());
        let ids: Vec<(String, u32)> = planned
            .scenarios()
            .map(|scenario| (scenario.scenario.name.clone(), scenario.id.line))
            .collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[0], ("browse".to_string(), 4));
        assert_eq!(ids[1].1, 13);
        assert_eq!(ids[2].1, 14);
        assert_eq!(ids[3], ("coupon".to_string(), 20));
        assert!(planned.scenarios().all(|scenario| scenario.id.path == "features/catalog.feature"));
        assert!(matches!(planned.children.last(), Some(PlannedChild::Rule(_))));
    }

    #[test]
    fn test_effective_tags_include_ancestors() {
        let feature = catalog();
        let planned = plan_feature(&feature, &RunOptions::default());
        let coupon = planned.scenarios().last().unwrap();
        let tags: Vec<&str> = coupon.effective_tags.iter().map(|tag| tag.name.as_str()).collect();
        assert_eq!(tags, vec!["flaky", "money", "shop"]);
    }

    #[test]
    fn test_selection_counts_across_the_suite() {
        let suite = Suite::new(vec![catalog(), catalog().at_path("features/other.feature")]);
        let options = RunOptions {
            selection: Selection {
                tags: TagFilter::parse_all(["@smoke or @money"]).unwrap(),
                ..Selection::all()
            },
            ..RunOptions::default()
        };
        let plan = plan_execution(&suite, &options);
        assert_eq!(plan.scenario_count(), 8);
        assert_eq!(plan.selected_count(), 4);
        assert!(plan.features.iter().all(|feature| feature.is_selected()));
    }

    #[test]
    fn test_unselected_rule_reports_not_selected() {
        let feature = catalog();
        let options = RunOptions {
            selection: Selection {
                tags: TagFilter::parse_all(["@smoke"]).unwrap(),
                ..Selection::all()
            },
            ..RunOptions::default()
        };
        let planned = plan_feature(&feature, &options);
        let Some(PlannedChild::Rule(rule)) = planned.children.last() else {
            panic!("expected the rule to be planned last");
        };
        assert!(!rule.is_selected());
        assert!(planned.is_selected());
    }

    #[test]
    fn test_outline_line_selects_every_row() {
        let feature = catalog();
        let options = RunOptions {
            selection: Selection {
                locations: vec!["features/catalog.feature:8".parse().unwrap()],
                ..Selection::all()
            },
            ..RunOptions::default()
        };
        let planned = plan_feature(&feature, &options);
        let selected: Vec<u32> = planned
            .scenarios()
            .filter(|scenario| scenario.selected)
            .map(|scenario| scenario.id.line)
            .collect();
        assert_eq!(selected, vec![13, 14]);
    }

    #[test]
    fn test_policies_follow_effective_tags() {
        let feature = catalog();
        let options = RunOptions {
            continue_after_failed_step: Some(TagExpression::parse("@shop and not @money").unwrap()),
            retry: Some(RetryPolicy {
                max_attempts: 3,
                tags: TagFilter::parse_all(["@flaky"]).unwrap(),
            }),
            ..RunOptions::default()
        };
        let planned = plan_feature(&feature, &options);
        let policies: Vec<(bool, u32)> = planned
            .scenarios()
            .map(|scenario| (scenario.continue_after_failed_step, scenario.max_attempts))
            .collect();
        assert_eq!(policies, vec![(true, 1), (true, 1), (true, 1), (false, 3)]);
    }
}
