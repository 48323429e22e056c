//! Benchmarks for infraplan core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use infraplan::core::types::{PlanOptions, ProjectConfig};
use infraplan::core::{emitter, parser, planner, policy, topology};

const PROJECT: &str = r#"
owner: acme
repository: wordpress
environments: [staging, production]
target:
  account: "123456789012"
  region: us-east-1
dns:
  domain: example.com
secrets:
  staging:
    PORT: 3000
    DB_HOST: db.internal
"#;

fn project_with(envs: usize) -> ProjectConfig {
    let labels: Vec<String> = (0..envs).map(|i| format!("env{i:02}")).collect();
    let yaml = PROJECT.replace(
        "environments: [staging, production]",
        &format!("environments: [staging, production, {}]", labels.join(", ")),
    );
    parser::resolve(parser::parse_config(&yaml).unwrap()).unwrap()
}

fn bench_config_resolve(c: &mut Criterion) {
    c.bench_function("config_resolve", |b| {
        b.iter(|| {
            let raw = parser::parse_config(black_box(PROJECT)).unwrap();
            black_box(parser::resolve(raw).unwrap());
        });
    });
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");
    for envs in [0, 8, 32] {
        let config = project_with(envs);
        for (label, parallel) in [("parallel", true), ("sequential", false)] {
            let options = PlanOptions {
                parallel,
                ..PlanOptions::default()
            };
            group.bench_with_input(
                BenchmarkId::new(label, envs + 2),
                &config,
                |b, config| {
                    b.iter(|| black_box(planner::plan(black_box(config), &options).unwrap()));
                },
            );
        }
    }
    group.finish();
}

fn bench_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit");
    for envs in [0, 8, 32] {
        let config = project_with(envs);
        let mut descriptors = topology::build_shared(&config);
        for env in &config.environments {
            for d in topology::build(&config, env, &PlanOptions::default()).unwrap() {
                if !descriptors.iter().any(|o| o.logical_id == d.logical_id) {
                    descriptors.push(d);
                }
            }
        }
        let policies = policy::compose(&config, &descriptors).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(descriptors.len()),
            &(descriptors, policies),
            |b, (descriptors, policies)| {
                b.iter(|| {
                    black_box(emitter::emit(descriptors.clone(), policies.clone()).unwrap());
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_config_resolve, bench_plan, bench_emit);
criterion_main!(benches);
