//! Contention Benchmarks
//!
//! Measures the shared bookkeeping the workers hit on every operation, and
//! short end-to-end runs of each adapter:
//! - counters: one atomic per outcome under N threads
//! - latency: single `Vec::push` critical section under N threads
//! - adapters: 100ms hot-SKU runs over a loopback link
//!
//! Run with: cargo bench --bench contention

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use tally::{
    run_adapter, BackendKind, LatencyStats, LinkConfig, OperationReport, Outcome,
    OutcomeCounters, Scenario, WorkloadConfig,
};

const RECORDS_PER_THREAD: usize = 10_000;

fn bench_counter_recording(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention/counters");

    for threads in [1, 2, 4, 8] {
        group.throughput(Throughput::Elements((threads * RECORDS_PER_THREAD) as u64));
        group.bench_function(BenchmarkId::new("record", threads), |b| {
            b.iter(|| {
                let counters = Arc::new(OutcomeCounters::new());
                let handles: Vec<_> = (0..threads)
                    .map(|t| {
                        let counters = Arc::clone(&counters);
                        std::thread::spawn(move || {
                            let outcome = if t % 2 == 0 {
                                Outcome::Success
                            } else {
                                Outcome::OutOfStock
                            };
                            let report = OperationReport::new(outcome).with_aborts(1);
                            for _ in 0..RECORDS_PER_THREAD {
                                counters.record(&report);
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    h.join().unwrap();
                }
                counters.snapshot()
            });
        });
    }

    group.finish();
}

fn bench_latency_recording(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention/latency");

    for threads in [1, 2, 4, 8] {
        group.throughput(Throughput::Elements((threads * RECORDS_PER_THREAD) as u64));
        group.bench_function(BenchmarkId::new("record", threads), |b| {
            b.iter(|| {
                let stats = Arc::new(LatencyStats::with_capacity(threads * RECORDS_PER_THREAD));
                let handles: Vec<_> = (0..threads)
                    .map(|t| {
                        let stats = Arc::clone(&stats);
                        std::thread::spawn(move || {
                            for i in 0..RECORDS_PER_THREAD {
                                stats.record((t * RECORDS_PER_THREAD + i) as f64);
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    h.join().unwrap();
                }
                stats.summary()
            });
        });
    }

    group.finish();
}

fn bench_adapter_runs(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention/adapters");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));

    let config = WorkloadConfig::default()
        .with_workers(8)
        .with_duration(Duration::from_millis(100))
        .with_scenario(Scenario::ConcurrentOrders)
        .with_initial_stock(1_000_000)
        .with_seed(1)
        .with_link(LinkConfig::loopback());

    for kind in BackendKind::ALL {
        group.bench_function(BenchmarkId::new("hot_sku_100ms", kind.name()), |b| {
            b.iter(|| run_adapter(&config, kind.build()).unwrap().report.operations);
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_counter_recording,
    bench_latency_recording,
    bench_adapter_runs
);
criterion_main!(benches);
