use criterion::{Criterion, criterion_group, criterion_main};
use moltest::cache::CacheDocument;
use moltest::core::expression::IdMatcher;
use moltest::models::{ParameterSet, ScenarioDescriptor, ScenarioStatus};
use moltest::planner::{ScenarioSelection, SelectionOptions, plan_execution};
use std::hint::black_box;

fn scenarios(count: usize) -> Vec<ScenarioDescriptor> {
    let mut scenarios: Vec<_> = (0..count)
        .map(|i| {
            let tags = if i % 7 == 0 { vec!["slow"] } else { vec!["fast"] };
            let scenario = ScenarioDescriptor::new(
                format!("role{}:scenario{}", i % 50, i),
                format!("scenario{i}"),
                format!("/tmp/roles/role{}", i % 50),
            )
            .with_tags(tags);
            if i % 5 == 0 {
                scenario.with_parameters(vec![
                    ParameterSet::new("debian").with_var("DISTRO", "debian"),
                    ParameterSet::new("alpine").with_var("DISTRO", "alpine"),
                ])
            } else {
                scenario
            }
        })
        .collect();
    scenarios.sort_by(|a, b| a.id.cmp(&b.id));
    scenarios
}

fn bench_plan_execution(c: &mut Criterion) {
    let discovered = scenarios(2_000);
    let mut cache = CacheDocument::default();
    for scenario in discovered.iter().step_by(3) {
        cache.update(&scenario.id, ScenarioStatus::Failed);
    }
    let options = SelectionOptions {
        selection: ScenarioSelection::All,
        id_expression: Some("(role1 or role2) and not scenario3".to_string()),
        skip_tags: ["slow".to_string()].into_iter().collect(),
        xfail_tags: Default::default(),
        rerun_failed: true,
    };

    c.bench_function("plan_execution_2000", |b| {
        b.iter(|| plan_execution(black_box(&discovered), black_box(&options), black_box(&cache)))
    });
}

fn bench_id_matcher(c: &mut Criterion) {
    let ids: Vec<String> = scenarios(2_000).into_iter().map(|s| s.id).collect();

    c.bench_function("id_matcher_compile_and_match", |b| {
        b.iter(|| {
            let matcher = IdMatcher::compile(black_box("role1 and (scenario1 or scenario2) and not role10"));
            ids.iter().filter(|id| matcher.matches(id)).count()
        })
    });
}

criterion_group!(benches, bench_plan_execution, bench_id_matcher);
criterion_main!(benches);
