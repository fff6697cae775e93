//! Post-run correctness audit
//!
//! Runs once, after every worker and the reconciler have stopped, over the
//! rows the adapter reads back. Two kinds of damage are looked for:
//!
//! - **Oversell** per inventory key: `available < 0`, `available > initial`,
//!   or more units on PAID orders than were ever seeded.
//! - **Orphan payments**: a CAPTURED payment whose order is missing or not
//!   PAID.

use crate::adapter::AuditState;
use crate::counters::CounterSnapshot;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tally_core::{OrderId, OrderStatus, PaymentStatus, Sku};
use tracing::{info, warn};

/// Why a key counts as oversold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OversellKind {
    /// Inventory went negative
    Negative,
    /// More inventory than was seeded
    AboveInitial,
    /// PAID orders hold more units than were seeded
    PaidOverInitial,
}

/// One oversold key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyViolation {
    /// Inventory key
    pub sku: Sku,
    /// Seeded stock
    pub initial: i64,
    /// Final stock
    pub available: i64,
    /// Units on PAID orders
    pub paid_units: i64,
    /// Every rule the key broke
    pub kinds: Vec<OversellKind>,
}

/// Outcome of the audit
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorrectnessReport {
    /// At least one key is oversold
    pub oversell_event: bool,
    /// Oversold keys
    pub oversell_events: u64,
    /// CAPTURED payments without a PAID order
    pub orphan_payments: u64,
    /// Stale projection reads reported by workers
    pub stale_reads: u64,
    /// Orders in PAID state
    pub paid_orders: u64,
    /// Units on PAID orders across all keys
    pub paid_units: i64,
    /// Stock left across all keys
    pub available_end: i64,
    /// Detail of every oversold key
    pub violations: Vec<KeyViolation>,
    /// Orders behind the orphan payments
    pub orphaned_orders: Vec<OrderId>,
}

impl CorrectnessReport {
    /// No oversell and no orphan
    pub fn is_clean(&self) -> bool {
        !self.oversell_event && self.orphan_payments == 0
    }
}

/// Checks final backend state against the ledger of PAID orders
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrectnessVerifier;

impl CorrectnessVerifier {
    /// Audit `state`; `counters` contributes the stale-read tally
    pub fn verify(state: &AuditState, counters: &CounterSnapshot) -> CorrectnessReport {
        let mut paid_units: BTreeMap<&Sku, i64> = BTreeMap::new();
        let mut paid_orders = 0;
        let mut statuses: HashMap<OrderId, OrderStatus> = HashMap::with_capacity(state.orders.len());
        for order in &state.orders {
            statuses.insert(order.id, order.status);
            if order.status == OrderStatus::Paid {
                paid_orders += 1;
                for line in &order.lines {
                    *paid_units.entry(&line.sku).or_default() += line.qty;
                }
            }
        }

        let mut violations = Vec::new();
        for item in &state.inventory {
            let paid = paid_units.get(&item.sku).copied().unwrap_or(0);
            let mut kinds = Vec::new();
            if item.available < 0 {
                kinds.push(OversellKind::Negative);
            }
            if item.available > item.initial {
                kinds.push(OversellKind::AboveInitial);
            }
            if paid > item.initial {
                kinds.push(OversellKind::PaidOverInitial);
            }
            if !kinds.is_empty() {
                warn!(
                    target: "tally::verifier",
                    sku = %item.sku,
                    initial = item.initial,
                    available = item.available,
                    paid_units = paid,
                    ?kinds,
                    "oversell"
                );
                violations.push(KeyViolation {
                    sku: item.sku.clone(),
                    initial: item.initial,
                    available: item.available,
                    paid_units: paid,
                    kinds,
                });
            }
        }

        let mut orphaned_orders = Vec::new();
        for payment in &state.payments {
            if payment.status != PaymentStatus::Captured {
                continue;
            }
            let order_status = statuses.get(&payment.order_id).copied();
            if order_status != Some(OrderStatus::Paid) {
                warn!(
                    target: "tally::verifier",
                    order = %payment.order_id,
                    ?order_status,
                    "orphan payment"
                );
                orphaned_orders.push(payment.order_id);
            }
        }

        let report = CorrectnessReport {
            oversell_event: !violations.is_empty(),
            oversell_events: violations.len() as u64,
            orphan_payments: orphaned_orders.len() as u64,
            stale_reads: counters.stale_reads,
            paid_orders,
            paid_units: paid_units.values().sum(),
            available_end: state.inventory.iter().map(|i| i.available).sum(),
            violations,
            orphaned_orders,
        };
        info!(
            target: "tally::verifier",
            paid_orders = report.paid_orders,
            available_end = report.available_end,
            oversell_events = report.oversell_events,
            orphan_payments = report.orphan_payments,
            "audit finished"
        );
        report
    }
}
