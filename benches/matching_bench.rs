use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use gherkin_runner::core::document::{Feature, Scenario, Step, Suite};
use gherkin_runner::core::hooks::Hooks;
use gherkin_runner::{RunOptions, Runner, StepRegistry, TagExpression};
use tokio::runtime::Runtime;

fn registry(size: usize) -> StepRegistry {
    let mut registry = StepRegistry::new();
    for i in 0..size {
        registry
            .given(&format!("user {i} has {{count:int}} items"), |_context, _step| Ok(()))
            .unwrap();
        registry
            .when(&format!("user {i} buys \"{{item}}\""), |_context, _step| Ok(()))
            .unwrap();
    }
    registry
}

fn bench_find_match(c: &mut Criterion) {
    let registry = registry(100);
    let first = Step::given("user 0 has 3 items");
    let last = Step::when("user 99 buys \"a kettle\"");
    let missing = Step::then("nobody wrote this step");

    c.bench_function("find_match_first", |b| {
        b.iter(|| registry.find_match(black_box(&first)))
    });
    c.bench_function("find_match_last", |b| {
        b.iter(|| registry.find_match(black_box(&last)))
    });
    c.bench_function("find_match_undefined", |b| {
        b.iter(|| registry.find_match(black_box(&missing)))
    });
}

fn bench_tag_expression(c: &mut Criterion) {
    let tags = vec!["@api", "@slow", "@checkout"];
    c.bench_function("tag_expression_parse_and_evaluate", |b| {
        b.iter(|| {
            let expression = TagExpression::parse(black_box("@api and not (@wip or @flaky) and @checkout")).unwrap();
            expression.evaluate(&tags)
        })
    });
}

fn suite(features: usize, scenarios: usize) -> Suite {
    Suite::new(
        (0..features)
            .map(|f| {
                (0..scenarios).fold(Feature::new(format!("feature {f}")), |feature, s| {
                    feature.scenario(
                        Scenario::new(format!("scenario {s}"))
                            .given(format!("user {s} has 2 items"))
                            .when(format!("user {s} buys \"tea\"")),
                    )
                })
            })
            .collect(),
    )
}

fn bench_run(c: &mut Criterion) {
    let runner = Runner::new(registry(20), Hooks::new(), RunOptions::default());
    let sequential = suite(4, 20);
    c.bench_function("run_sequential", |b| b.iter(|| runner.run(black_box(&sequential))));

    let rt = Runtime::new().unwrap();
    let parallel = Runner::new(
        registry(20),
        Hooks::new(),
        RunOptions {
            jobs: 4,
            ..RunOptions::default()
        },
    );
    let shared = Arc::new(suite(4, 20));
    c.bench_function("run_parallel", |b| {
        b.to_async(&rt)
            .iter(|| async { parallel.run_parallel(Arc::clone(&shared)).await })
    });
}

criterion_group!(benches, bench_find_match, bench_tag_expression, bench_run);
criterion_main!(benches);
