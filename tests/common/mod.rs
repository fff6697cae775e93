//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;
pub use tally::{
    run_adapter, BackendKind, BenchmarkRun, LinkConfig, OversellKind, RetryConfig, Scenario,
    WorkloadConfig,
};
use tally_core::{OrderStatus, Sku};

// ============================================================================
// Initialization
// ============================================================================

/// Install a test-writer subscriber once per process
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// ============================================================================
// Configurations
// ============================================================================

/// Short, contended run: 32 workers, one second, 100 units, ~100us links
pub fn contended(scenario: Scenario) -> WorkloadConfig {
    WorkloadConfig::default()
        .with_workers(32)
        .with_duration(Duration::from_secs(1))
        .with_scenario(scenario)
        .with_initial_stock(100)
        .with_hot_skus(8)
        .with_seed(0xC0FFEE)
        .with_link(LinkConfig::default().with_round_trip_us(100).with_jitter_us(50))
}

/// Same as [`contended`] but with retries that practically never run out
pub fn patient(scenario: Scenario) -> WorkloadConfig {
    contended(scenario).with_retry(RetryConfig::default().with_max_retries(10_000))
}

/// Run `config` against a fresh backend of `kind`
pub fn bench(config: &WorkloadConfig, kind: BackendKind) -> BenchmarkRun {
    init_tracing();
    run_adapter(config, kind.build()).expect("benchmark run")
}

// ============================================================================
// Ledger helpers
// ============================================================================

/// Units on PAID orders per SKU
pub fn paid_units(run: &BenchmarkRun) -> HashMap<Sku, i64> {
    let mut units = HashMap::new();
    for order in &run.state.orders {
        if order.status == OrderStatus::Paid {
            for line in &order.lines {
                *units.entry(line.sku.clone()).or_insert(0) += line.qty;
            }
        }
    }
    units
}

/// Orders in a given status
pub fn count_orders(run: &BenchmarkRun, status: OrderStatus) -> u64 {
    run.state
        .orders
        .iter()
        .filter(|o| o.status == status)
        .count() as u64
}
