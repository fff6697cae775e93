//! Counters, setup and report plumbing

use crate::common::*;

#[test]
fn terminal_counters_sum_to_operations() {
    for scenario in [Scenario::ConcurrentOrders, Scenario::Rollback] {
        for kind in BackendKind::ALL {
            let run = bench(&contended(scenario), kind);
            let c = run.output.counters;
            assert_eq!(c.operations(), run.output.completed, "{} {}", kind, scenario);
            assert_eq!(run.report.operations, run.output.completed);
        }
    }
}

#[test]
fn setup_is_idempotent() {
    init_tracing();
    let config = contended(Scenario::Rollback);
    for kind in BackendKind::ALL {
        let once = kind.build();
        once.setup(&config).unwrap();
        let twice = kind.build();
        twice.setup(&config).unwrap();
        twice.setup(&config).unwrap();

        let mut a = once.audit().unwrap();
        let mut b = twice.audit().unwrap();
        a.inventory.sort_by(|x, y| x.sku.cmp(&y.sku));
        b.inventory.sort_by(|x, y| x.sku.cmp(&y.sku));
        assert_eq!(a, b, "{}", kind);
        assert_eq!(a.inventory.len(), 8);
    }
}

#[test]
fn latency_excludes_failed_operations() {
    let link = LinkConfig::default()
        .with_round_trip_us(50)
        .with_jitter_us(0)
        .with_failure_rate(0.02);
    let config = contended(Scenario::ConcurrentOrders).with_link(link);
    for kind in BackendKind::ALL {
        let run = bench(&config, kind);
        assert!(run.report.failed > 0, "{}", kind);
        assert_eq!(
            run.report.latency_ms.count as u64,
            run.report.operations - run.report.failed
        );
    }
}

#[test]
fn report_serializes_flat() {
    let run = bench(&contended(Scenario::Rollback), BackendKind::Document);
    let json: serde_json::Value = serde_json::from_str(&run.report.to_json().unwrap()).unwrap();
    for field in [
        "paid_orders",
        "available_end",
        "oversell_event",
        "throughput_succ_per_s",
        "out_of_stock",
        "failed",
        "gave_up",
        "abort",
        "orders_ok",
        "compensations",
        "stale_reads",
        "oversell_events",
        "orphan_payments",
    ] {
        assert!(json.get(field).is_some(), "missing {}", field);
    }
    assert!(json["latency_ms"]["p50"].is_number());
    assert!(json["latency_ms"]["p95"].is_number());
}
