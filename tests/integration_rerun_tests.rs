//! # Rerun File Integration Tests / 重跑文件集成测试
//!
//! Writes rerun files from real runs and feeds them back as location
//! selection.
//!
//! 从真实运行写入重跑文件，并将其作为位置选择重新输入。

mod common;

use common::*;
use gherkin_runner::core::config::RunOptions;
use gherkin_runner::core::document::{Feature, ScenarioOutline, Examples, Table, Suite};
use gherkin_runner::core::hooks::Hooks;
use gherkin_runner::core::planner::{ScenarioLocation, Selection};
use gherkin_runner::reporting::rerun::{parse, read_rerun_file, render, write_rerun_file};
use gherkin_runner::{RunResult, Runner, Status};

fn mixed_suite() -> Suite {
    Suite::new(vec![
        Feature::new("Login")
            .at_path("features/login.feature")
            .scenario(passing_scenario("good password", 3))
            .scenario(failing_scenario("bad password", 9))
            .scenario(failing_scenario("locked account", 15)),
        Feature::new("Search")
            .at_path("features/search.feature")
            .scenario(passing_scenario("by name", 2)),
        Feature::new("Cart")
            .at_path("features/cart.feature")
            .scenario(failing_scenario("empty cart", 4)),
    ])
}

fn run(suite: &Suite, options: RunOptions) -> RunResult {
    Runner::new(arithmetic_registry(), Hooks::new(), options)
        .run(suite)
        .unwrap()
}

#[cfg(test)]
mod render_tests {
    use super::*;

    #[test]
    fn test_render_groups_lines_per_file_in_run_order() {
        let result = run(&mixed_suite(), RunOptions::default());
        assert_eq!(
            render(&result),
            "# -- RERUN: 3 failing scenarios during last test run.\n\
             features/login.feature:9:15\n\
             features/cart.feature:4\n"
        );
    }

    #[test]
    fn test_render_is_empty_when_nothing_failed() {
        let suite = single_feature_suite(Feature::new("F").scenario(passing_scenario("S", 3)));
        let result = run(&suite, RunOptions::default());
        assert_eq!(render(&result), "");
    }

    #[test]
    fn test_outline_rows_are_listed_by_row_line() {
        let outline = ScenarioOutline::new("adding")
            .at_line(5)
            .given("a=<a>")
            .when("compute")
            .then("the result is <sum>")
            .examples(Examples::new(
                Table::new(["a", "sum"]).at_line(9).row(["1", "3"]).row(["2", "5"]),
            ));
        let suite = single_feature_suite(Feature::new("F").at_path("outline.feature").outline(outline));
        let result = run(&suite, RunOptions::default());
        assert!(render(&result).ends_with("outline.feature:11\n"));
    }

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let locations = parse("# -- RERUN: 2\n\nfeatures/a.feature:3:7\n  features/b.feature  \n").unwrap();
        assert_eq!(
            locations,
            vec![
                ScenarioLocation::new("features/a.feature", Some(3)),
                ScenarioLocation::new("features/a.feature", Some(7)),
                ScenarioLocation::new("features/b.feature", None),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_empty_path() {
        assert!(parse(":12\n").is_err());
    }
}

#[cfg(test)]
mod file_tests {
    use super::*;

    #[test]
    fn test_write_then_rerun_selects_only_failures() {
        let temp_dir = setup_test_environment();
        let path = temp_dir.path().join("reports").join("rerun.txt");
        let first = run(&mixed_suite(), RunOptions::default());
        write_rerun_file(&path, &first).unwrap();
        assert!(path.exists());

        let locations = read_rerun_file(&path).unwrap();
        assert_eq!(locations.len(), 3);
        let options = RunOptions {
            selection: Selection {
                locations,
                ..Selection::all()
            },
            ..RunOptions::default()
        };
        let second = run(&mixed_suite(), options);
        let executed: Vec<&str> = second
            .scenarios()
            .filter(|scenario| scenario.status != Status::Skipped)
            .map(|scenario| scenario.name.as_str())
            .collect();
        assert_eq!(executed, vec!["bad password", "locked account", "empty cart"]);
        assert_eq!(second.rerun, first.rerun);
    }

    #[test]
    fn test_passing_run_removes_stale_rerun_file() {
        let temp_dir = setup_test_environment();
        let path = temp_dir.path().join("rerun.txt");
        std::fs::write(&path, "features/old.feature:1\n").unwrap();

        let suite = single_feature_suite(Feature::new("F").scenario(passing_scenario("S", 3)));
        write_rerun_file(&path, &run(&suite, RunOptions::default())).unwrap();
        assert!(!path.exists());

        // Nothing to remove is fine too.
        write_rerun_file(&path, &run(&suite, RunOptions::default())).unwrap();
    }

    #[test]
    fn test_reading_a_missing_rerun_file_names_the_path() {
        let temp_dir = setup_test_environment();
        let path = temp_dir.path().join("missing.txt");
        let error = read_rerun_file(&path).unwrap_err();
        assert!(error.to_string().contains("missing.txt"));
    }
}
