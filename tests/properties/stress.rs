//! Long, heavily contended runs; opt-in

use crate::common::*;
use std::time::Duration;

fn stress(scenario: Scenario) -> WorkloadConfig {
    contended(scenario)
        .with_workers(200)
        .with_pool_cap(200)
        .with_duration(Duration::from_secs(20))
        .with_initial_stock(1_000)
}

#[test]
#[ignore]
fn naive_oversells_under_heavy_contention() {
    let run = bench(&stress(Scenario::ConcurrentOrders), BackendKind::WideColumn);
    assert!(run.report.paid_orders > 1_000, "paid {}", run.report.paid_orders);
    assert!(run.report.oversell_event);
}

#[test]
#[ignore]
fn strict_never_exceeds_stock_under_heavy_contention() {
    let config = stress(Scenario::ConcurrentOrders)
        .with_retry(RetryConfig::default().with_max_retries(10_000));
    let run = bench(&config, BackendKind::Serializable);
    assert!(run.report.paid_orders <= 1_000);
    assert_eq!(
        run.report.available_end,
        1_000 - run.report.paid_orders as i64
    );
    assert!(!run.report.oversell_event);
}

#[test]
#[ignore]
fn rollback_suite_under_heavy_contention() {
    let config = stress(Scenario::Rollback).with_hot_skus(50);
    for (kind, report) in tally::run_suite(&config, &BackendKind::ALL) {
        let report = report.unwrap();
        assert_eq!(report.backend, kind.name());
        assert!(report.operations > 0);
    }
}
