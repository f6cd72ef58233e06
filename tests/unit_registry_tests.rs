//! # Step Registry Unit Tests / 步骤注册表单元测试
//!
//! Pattern compilation, keyword-class compatibility, ambiguity detection
//! and argument conversion.
//!
//! 模式编译、关键字类别兼容性、歧义检测和参数转换测试。

use gherkin_runner::core::document::Step;
use gherkin_runner::core::errors::{MatchError, PatternError};
use gherkin_runner::core::patterns::{ParameterType, ParameterTypes, PatternSyntax, StepPattern, Value, suggest_pattern};
use gherkin_runner::core::registry::PatternClass;
use gherkin_runner::{Context, StepRegistry};

fn noop_registry(patterns: &[(PatternClass, &str)]) -> StepRegistry {
    let mut registry = StepRegistry::new();
    for (class, pattern) in patterns {
        registry
            .register(*class, pattern, |_context, _step| Ok(()))
            .expect("valid pattern");
    }
    registry
}

#[cfg(test)]
mod pattern_tests {
    use super::*;

    #[test]
    fn test_parameterized_pattern_is_anchored() {
        let pattern = StepPattern::compile("a user named {name}", &ParameterTypes::default()).unwrap();
        assert_eq!(pattern.syntax(), PatternSyntax::Parameterized);
        assert!(pattern.is_match("a user named Bob"));
        assert!(!pattern.is_match("given a user named Bob"));
    }

    #[test]
    fn test_regex_patterns_start_with_caret() {
        let pattern = StepPattern::compile(r"^I have (?P<count>\d+) apples$", &ParameterTypes::default()).unwrap();
        assert_eq!(pattern.syntax(), PatternSyntax::Regex);
        let arguments = pattern.extract("I have 3 apples").unwrap().unwrap();
        assert_eq!(arguments[0].name.as_deref(), Some("count"));
        assert_eq!(arguments[0].value, Value::Str("3".to_string()));
    }

    #[test]
    fn test_typed_placeholders_convert_values() {
        let pattern = StepPattern::compile("{count:int} items cost {price:float}", &ParameterTypes::default()).unwrap();
        let arguments = pattern.extract("3 items cost 4.5").unwrap().unwrap();
        assert_eq!(arguments[0].value, Value::Int(3));
        assert_eq!(arguments[1].value, Value::Float(4.5));
        assert_eq!(arguments[0].raw, "3");
        assert_eq!((arguments[1].start, arguments[1].end), (13, 16));
    }

    #[test]
    fn test_double_braces_are_literal() {
        let pattern = StepPattern::compile("the json {{}} is empty", &ParameterTypes::default()).unwrap();
        assert!(pattern.is_match("the json {} is empty"));
    }

    #[test]
    fn test_unknown_parameter_type_is_rejected() {
        let error = StepPattern::compile("{n:money}", &ParameterTypes::default()).unwrap_err();
        assert!(matches!(error, PatternError::UnknownType { ref type_name, .. } if type_name == "money"));
    }

    #[test]
    fn test_malformed_placeholders_are_rejected() {
        let types = ParameterTypes::default();
        for source in ["a {name", "a name}", "{a b}", "{x} and {x}", "{x:}"] {
            let error = StepPattern::compile(source, &types).unwrap_err();
            assert!(matches!(error, PatternError::Placeholder { .. }), "{source}: {error}");
        }
    }

    #[test]
    fn test_regex_ending_in_escaped_dollar_keeps_the_escape() {
        let registry = noop_registry(&[(PatternClass::Any, r"^the price is \$")]);
        assert!(registry.find_match(&Step::then("the price is $")).unwrap().is_some());
        assert!(registry.find_match(&Step::then("the price is ")).unwrap().is_none());

        let pattern = StepPattern::compile(r"^costs (\d+)\$$", &ParameterTypes::default()).unwrap();
        let arguments = pattern.extract("costs 12$").unwrap().unwrap();
        assert_eq!(arguments[0].value, Value::Str("12".to_string()));
    }

    #[test]
    fn test_invalid_regex_is_a_pattern_error() {
        let error = StepPattern::compile("^unclosed (group$", &ParameterTypes::default()).unwrap_err();
        assert!(matches!(error, PatternError::Regex { .. }));
    }

    #[test]
    fn test_suggest_pattern_replaces_literals() {
        assert_eq!(suggest_pattern(r#"a user named "Bob" aged 42"#), r#"a user named "{}" aged {:int}"#);
        assert_eq!(suggest_pattern("the price is 4.50"), "the price is {:float}");
        assert_eq!(suggest_pattern("a {literal} brace"), "a {{literal}} brace");
    }
}

#[cfg(test)]
mod matching_tests {
    use super::*;

    #[test]
    fn test_no_match_is_undefined() {
        let registry = noop_registry(&[(PatternClass::Context, "something else")]);
        assert!(registry.find_match(&Step::given("a user")).unwrap().is_none());
    }

    #[test]
    fn test_keyword_class_must_be_compatible() {
        let registry = noop_registry(&[(PatternClass::Outcome, "the result is {n:int}")]);
        assert!(registry.find_match(&Step::given("the result is 2")).unwrap().is_none());
        assert!(registry.find_match(&Step::then("the result is 2")).unwrap().is_some());
    }

    #[test]
    fn test_any_class_matches_every_keyword() {
        let registry = noop_registry(&[(PatternClass::Any, "a passing step")]);
        for step in [Step::given("a passing step"), Step::when("a passing step"), Step::then("a passing step")] {
            assert!(registry.find_match(&step).unwrap().is_some());
        }
    }

    #[test]
    fn test_ambiguity_lists_every_candidate() {
        let registry = noop_registry(&[
            (PatternClass::Context, "a user named {name}"),
            (PatternClass::Context, "a user named {name:word}"),
            (PatternClass::Outcome, "a user named Bob"),
        ]);
        let error = registry.find_match(&Step::given("a user named Bob")).unwrap_err();
        let MatchError::Ambiguous(ambiguous) = error else {
            panic!("expected an ambiguous match");
        };
        assert_eq!(ambiguous.candidates.len(), 2);
        let rendered = ambiguous.to_string();
        assert!(rendered.contains("a user named {name}"));
        assert!(rendered.contains("a user named {name:word}"));
    }

    #[test]
    fn test_registration_order_does_not_decide_matches() {
        let first = noop_registry(&[
            (PatternClass::Any, "{x} apples"),
            (PatternClass::Any, "{x:int} apples"),
        ]);
        let second = noop_registry(&[
            (PatternClass::Any, "{x:int} apples"),
            (PatternClass::Any, "{x} apples"),
        ]);
        assert!(first.find_match(&Step::given("3 apples")).is_err());
        assert!(second.find_match(&Step::given("3 apples")).is_err());
    }

    #[test]
    fn test_conversion_failure_is_a_match_error() {
        let mut registry = StepRegistry::new();
        registry
            .register_type(ParameterType::new("color", "red|green", |text| {
                if text == "green" {
                    Err("green is not supported".to_string())
                } else {
                    Ok(Value::Str(text.to_string()))
                }
            }))
            .unwrap();
        registry.given("a {c:color} light", |_context, _step| Ok(())).unwrap();
        let error = registry.find_match(&Step::given("a green light")).unwrap_err();
        assert!(matches!(error, MatchError::Conversion { ref type_name, .. } if type_name == "color"));
        assert!(registry.find_match(&Step::given("a red light")).unwrap().is_some());
    }

    #[test]
    fn test_duplicate_parameter_type_is_rejected() {
        let mut registry = StepRegistry::new();
        let error = registry
            .register_type(ParameterType::new("int", r"\d+", |text| Ok(Value::Str(text.to_string()))))
            .unwrap_err();
        assert!(matches!(error, PatternError::DuplicateType(ref name) if name == "int"));
    }

    #[test]
    fn test_match_records_registration_site() {
        let registry = noop_registry(&[(PatternClass::Context, "a user")]);
        let matched = registry.find_match(&Step::given("a user")).unwrap().unwrap();
        assert!(matched.location.file.ends_with("unit_registry_tests.rs"));
        assert!(matched.location.line > 0);
    }

    #[test]
    fn test_invoke_passes_converted_arguments() {
        let mut registry = StepRegistry::new();
        registry
            .given("{a:int} plus {b:int}", |context, step| {
                let sum = step.arg::<i64>("a")? + step.arg::<i64>("b")?;
                context.set("sum", sum)?;
                Ok(())
            })
            .unwrap();
        let step = Step::given("2 plus 40");
        let matched = registry.find_match(&step).unwrap().unwrap();
        let mut context = Context::new();
        registry.invoke(&matched, &mut context, &step).unwrap();
        assert_eq!(context.get::<i64>("sum"), Some(&42));
    }

    #[test]
    fn test_clear_removes_definitions() {
        let mut registry = noop_registry(&[(PatternClass::Any, "a step")]);
        assert_eq!(registry.len(), 1);
        registry.clear();
        assert!(registry.is_empty());
    }
}

#[cfg(test)]
mod repeat_match_tests {
    use super::*;
    use gherkin_runner::core::document::Scenario;
    use proptest::prelude::*;

    fn shop_registry() -> StepRegistry {
        let mut registry = StepRegistry::new();
        registry.given("a user named {name}", |_context, _step| Ok(())).unwrap();
        registry.when("I add {a:int} and {b:float}", |_context, _step| Ok(())).unwrap();
        registry.then(r"^the basket holds (?P<count>\d+) items?$", |_context, _step| Ok(())).unwrap();
        registry
    }

    #[test]
    fn test_resolving_steps_twice_gives_identical_matches() {
        let registry = shop_registry();
        let scenario = Scenario::new("basket")
            .given("a user named \"Bob\"")
            .when("I add 3 and 4.5")
            .then("the basket holds 1 item")
            .and("nobody wrote this");
        let resolve = || -> Vec<_> {
            scenario
                .steps
                .iter()
                .map(|step| registry.find_match(step).unwrap())
                .collect()
        };
        let first = resolve();
        assert_eq!(first.len(), 4);
        assert!(first[3].is_none());
        assert_eq!(resolve(), first);
    }

    proptest! {
        #[test]
        fn test_find_match_is_repeatable(a in any::<i32>(), b in 0u16..1000, count in 0u32..50) {
            let registry = shop_registry();
            for step in [
                Step::when(format!("I add {a} and {b}.5")),
                Step::then(format!("the basket holds {count} items")),
            ] {
                let first = registry.find_match(&step).unwrap();
                prop_assert!(first.is_some());
                prop_assert_eq!(registry.find_match(&step).unwrap(), first);
            }
        }
    }
}
