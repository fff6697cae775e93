//! Every late-failed order is undone, or it shows up as damage

use crate::common::*;
use std::collections::HashMap;
use tally_core::{OrderStatus, PaymentStatus};

/// Each CANCELLED order is refunded or never captured; anything else is an orphan
fn assert_complete_or_counted(run: &BenchmarkRun) {
    let payments: HashMap<_, _> = run
        .state
        .payments
        .iter()
        .map(|p| (p.order_id, p.status))
        .collect();
    let mut unrefunded = 0;
    for order in &run.state.orders {
        if order.status != OrderStatus::Paid
            && payments.get(&order.id) == Some(&PaymentStatus::Captured)
        {
            unrefunded += 1;
        }
    }
    assert_eq!(unrefunded, run.report.orphan_payments, "{}", run.report.backend);
}

#[test]
fn compensation_is_complete_or_counted_everywhere() {
    let config = patient(Scenario::Rollback).with_late_failure_probability(0.25);
    for kind in BackendKind::ALL {
        let run = bench(&config, kind);
        assert!(run.report.compensations > 0, "{} never compensated", kind);
        assert_complete_or_counted(&run);
    }
}

#[test]
fn strict_and_atomic_restore_every_reserved_unit() {
    let config = patient(Scenario::Rollback).with_late_failure_probability(0.25);
    for kind in [BackendKind::Serializable, BackendKind::Document] {
        let run = bench(&config, kind);
        let paid = paid_units(&run);
        for item in &run.state.inventory {
            let sold = paid.get(&item.sku).copied().unwrap_or(0);
            assert_eq!(item.available, item.initial - sold, "{} {}", kind, item.sku);
        }
        assert_eq!(run.report.orphan_payments, 0);
        assert_eq!(count_orders(&run, OrderStatus::Pending), 0);
    }
}

#[test]
fn every_failure_compensates_when_probability_is_one() {
    let config = patient(Scenario::Rollback)
        .with_initial_stock(10_000)
        .with_late_failure_probability(1.0);
    for kind in BackendKind::ALL {
        let run = bench(&config, kind);
        assert_eq!(run.report.orders_ok, 0, "{}", kind);
        assert_eq!(run.report.paid_orders, 0, "{}", kind);
        assert_eq!(
            run.report.compensations + run.report.failed + run.report.gave_up,
            run.report.operations
        );
    }
}
