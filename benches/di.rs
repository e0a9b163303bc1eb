use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrous_container::*;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

fn unit() -> ServiceDefinition {
    ServiceDefinition::new(ServiceResolver::constructor_sync(|deps| Ok(deps.len())))
}

// ===== Micro Benchmarks =====

fn bench_singleton_hit(c: &mut Criterion) {
    let rt = runtime();
    let provider = ServiceProvider::new();
    provider.register_value("answer", 42u64);
    rt.block_on(provider.resolve("answer")).unwrap();

    c.bench_function("singleton_hit_u64", |b| {
        b.iter(|| {
            let v = rt.block_on(provider.resolve_as::<u64>("answer")).unwrap();
            black_box(v);
        })
    });
}

fn bench_singleton_cold(c: &mut Criterion) {
    struct ExpensiveToCreate {
        data: Vec<u64>,
    }

    let rt = runtime();
    c.bench_function("singleton_cold_expensive", |b| {
        b.iter_batched(
            || {
                let provider = ServiceProvider::new();
                provider.register(
                    "expensive",
                    ServiceDefinition::new(ServiceResolver::constructor_sync(|_| {
                        Ok(ExpensiveToCreate { data: (0..1000).collect() })
                    })),
                );
                provider
            },
            |provider| {
                let v = rt.block_on(provider.resolve_as::<ExpensiveToCreate>("expensive")).unwrap();
                black_box(v.data.len());
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_transient(c: &mut Criterion) {
    let rt = runtime();
    let provider = ServiceProvider::new();
    provider.register("request", unit().transient());

    c.bench_function("transient_no_deps", |b| {
        b.iter(|| {
            let v = rt.block_on(provider.resolve("request")).unwrap();
            black_box(v);
        })
    });
}

// ===== Dependency Chains =====

fn bench_chain_depth(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("transient_chain");

    for depth in [1usize, 4, 16, 64] {
        let provider = ServiceProvider::new();
        for i in 0..depth {
            provider.register(format!("n{i}"), unit().transient().depends_on(format!("n{}", i + 1)));
        }
        provider.register(format!("n{depth}"), unit().transient());

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                let v = rt.block_on(provider.resolve("n0")).unwrap();
                black_box(v);
            })
        });
    }
    group.finish();
}

fn bench_fan_in(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("singleton_fan_in");

    for width in [4usize, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter_batched(
                || {
                    let provider = ServiceProvider::new();
                    provider.register("shared", unit());
                    let mids: Vec<String> = (0..width).map(|i| format!("mid{i}")).collect();
                    for mid in &mids {
                        provider.register(mid, unit().depends_on("shared"));
                    }
                    provider.register("root", unit().with_dependencies(mids));
                    provider
                },
                |provider| {
                    let v = rt.block_on(provider.resolve("root")).unwrap();
                    black_box(v);
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

// ===== Diagnostics =====

fn bench_cycle_detection(c: &mut Criterion) {
    let provider = ServiceProvider::new();
    for i in 0..200 {
        provider.register(format!("s{i}"), unit().depends_on(format!("s{}", (i + 1) % 200)));
    }

    c.bench_function("graph_detect_cycles_200", |b| {
        b.iter(|| {
            let cycles = provider.dependency_graph().detect_cycles();
            black_box(cycles);
        })
    });
}

criterion_group!(
    benches,
    bench_singleton_hit,
    bench_singleton_cold,
    bench_transient,
    bench_chain_depth,
    bench_fan_in,
    bench_cycle_detection
);
criterion_main!(benches);
