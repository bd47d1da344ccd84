//! Benchmarks for the simulator.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use mkfirm_sim::{ExitCondition, MkMonitor, Simulation, SimulationConfig, Task, TaskSet, TraceContext};
use mkfirm_test_helpers::must;
use std::hint::black_box;

fn task_set(n: u32) -> TaskSet {
    let tasks = (0..n)
        .map(|id| {
            let period = 10 + i64::from(id % 7) * 5;
            let builder = Task::builder(id)
                .execution_time(1 + i64::from(id % 3))
                .priority(i64::from(id));
            match id % 3 {
                0 => must(builder.periodic(period)),
                1 => must(builder.mk_firm(period, 2, 3)),
                _ => must(builder.distance_priority(period, 3, 5)),
            }
        })
        .collect();
    must(TaskSet::new(tasks))
}

fn bench_mk_push(c: &mut Criterion) {
    let mut monitor = must(MkMonitor::new(3, 64));
    let mut bit = false;

    c.bench_function("mk_push", |b| {
        b.iter(|| {
            bit = !bit;
            monitor.push(black_box(bit));
            black_box(monitor.distance());
        });
    });
}

fn bench_schedulers(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate_1000_ticks");
    for scheduler in ["list", "fpp", "gdpa", "gdpas"] {
        for n in [4u32, 16] {
            group.bench_with_input(BenchmarkId::new(scheduler, n), &n, |b, &n| {
                b.iter(|| {
                    let mut sim = must(Simulation::new(
                        task_set(n),
                        scheduler,
                        must(
                            SimulationConfig::builder()
                                .abort_on(ExitCondition::empty())
                                .build(),
                        ),
                        TraceContext::none(),
                    ));
                    black_box(must(sim.run(1_000)));
                    black_box(must(sim.finalise()));
                    black_box(sim.get_results())
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_mk_push, bench_schedulers);
criterion_main!(benches);
