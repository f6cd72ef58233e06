//! # Context Unit Tests / 上下文单元测试
//!
//! Layer shadowing, origin tracking and scenario control switches.
//!
//! 层遮蔽、来源跟踪和场景控制开关测试。

use gherkin_runner::core::context::{Origin, ScopeLevel};
use gherkin_runner::core::errors::ContextError;
use gherkin_runner::Context;

#[cfg(test)]
mod context_tests {
    use super::*;

    #[test]
    fn test_values_are_typed() {
        let mut context = Context::new();
        context.set("count", 3_i64).unwrap();
        assert_eq!(context.get::<i64>("count"), Some(&3));
        assert_eq!(context.get::<String>("count"), None);
        assert!(context.contains("count"));
        assert!(!context.contains("missing"));
    }

    #[test]
    fn test_get_mut_updates_in_place() {
        let mut context = Context::new();
        context.set("items", vec![1, 2]).unwrap();
        context.get_mut::<Vec<i32>>("items").unwrap().push(3);
        assert_eq!(context.get::<Vec<i32>>("items"), Some(&vec![1, 2, 3]));
    }

    #[test]
    fn test_root_level_and_user_origin() {
        let mut context = Context::new();
        assert_eq!(context.level(), ScopeLevel::Root);
        context.set("k", "v".to_string()).unwrap();
        assert_eq!(context.defined_at("k"), Some(ScopeLevel::Root));
        assert_eq!(context.origin_of("k"), Some(Origin::User));
        assert_eq!(context.keys(), vec!["k"]);
    }

    #[test]
    fn test_output_buffers_are_writable() {
        use std::fmt::Write as _;
        let mut context = Context::new();
        write!(context.stdout(), "hello").unwrap();
        context.stderr().push_str("oops");
        assert_eq!(context.stdout().as_str(), "hello");
        assert_eq!(context.stderr().as_str(), "oops");
    }

    #[test]
    fn test_scenario_control_switches() {
        let mut context = Context::new();
        assert!(!context.continue_after_failed_step());
        context.set_continue_after_failed_step(true);
        assert!(context.continue_after_failed_step());
        context.skip_scenario("not today");
    }

    #[test]
    fn test_masking_error_names_the_key() {
        let error = ContextError::MasksRunnerKey { key: "feature".to_string() };
        assert!(error.to_string().contains("`feature`"));
    }
}
