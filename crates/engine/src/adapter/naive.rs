//! Naive read-modify-write adapter over the wide-column store
//!
//! Inventory is decremented by reading `available`, subtracting in the
//! client and writing the result back unconditionally. Two workers that read
//! the same value both write `value - qty`, and one decrement is lost.

use super::cart::{cart_for, Reserved};
use super::{audit_statements, AuditState, BackendAdapter, ReadModel, Strategy, WorkerContext};
use crate::config::{Scenario, WorkloadConfig};
use crate::counters::{OperationReport, Outcome};
use std::sync::Arc;
use tally_core::{
    Order, OrderId, OrderStatus, Payment, PaymentStatus, Sku, TallyResult,
};
use tally_storage::{Keyspace, Link, OrderStatements, WideColumnStore};
use tracing::{debug, info};

/// Weak backend: last-writer-wins statements, no compare-and-set
#[derive(Debug)]
pub struct NaiveAdapter {
    store: Arc<WideColumnStore>,
}

impl Default for NaiveAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl NaiveAdapter {
    /// Adapter over an empty store
    pub fn new() -> Self {
        Self {
            store: Arc::new(WideColumnStore::new("wide_column")),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &WideColumnStore {
        &self.store
    }

    /// `available += delta` as two statements
    fn adjust(&self, link: &mut Link, sku: &Sku, delta: i64) -> TallyResult<()> {
        let current = self.store.read_available(link, sku)?;
        self.store.write_available(link, sku, current + delta)
    }

    /// Whether the projection disagrees with the status just written
    fn probe(&self, link: &mut Link, id: OrderId, expected: OrderStatus) -> TallyResult<bool> {
        Ok(self
            .store
            .projection(link, id)?
            .map_or(true, |record| record.status != expected))
    }

    fn concurrent_order(&self, ctx: &mut WorkerContext) -> TallyResult<OperationReport> {
        let order = Order::pending(ctx.new_order_id(), cart_for(&mut ctx.rng, &ctx.config));
        let link = &mut ctx.link;
        self.store.insert_order(link, order.clone())?;

        // Client-side check on a value that may already be stale
        for line in &order.lines {
            let available = self.store.read_available(link, &line.sku)?;
            if available < line.qty {
                self.store
                    .set_order_status(link, order.id, OrderStatus::Cancelled)?;
                return Ok(Outcome::OutOfStock.into());
            }
            self.store
                .write_available(link, &line.sku, available - line.qty)?;
        }

        self.store.insert_payment(
            link,
            Payment {
                order_id: order.id,
                status: PaymentStatus::Captured,
                amount: order.total,
            },
        )?;
        self.store.set_order_status(link, order.id, OrderStatus::Paid)?;
        Ok(Outcome::Success.into())
    }

    fn rollback_order(&self, ctx: &mut WorkerContext) -> OperationReport {
        let order = Order::pending(ctx.new_order_id(), cart_for(&mut ctx.rng, &ctx.config));
        let mut reserved = Reserved::new();

        let placed = self.place(ctx, &order, &mut reserved);
        let late = matches!(placed, Ok(())) && ctx.late_failure();

        match placed {
            Ok(()) if !late => {
                let link = &mut ctx.link;
                let settled = self
                    .store
                    .set_order_status(link, order.id, OrderStatus::Paid)
                    .and_then(|_| self.probe(link, order.id, OrderStatus::Paid));
                match settled {
                    Ok(stale) => OperationReport::new(Outcome::Success).with_stale_read(stale),
                    Err(e) => {
                        debug!(target: "tally::adapter", error = %e, "settle failed");
                        self.undo(&mut ctx.link, order.id, &reserved, Outcome::Failed)
                    }
                }
            }
            Ok(()) => self.undo(&mut ctx.link, order.id, &reserved, Outcome::Compensated),
            Err(e) => {
                debug!(target: "tally::adapter", error = %e, "placement failed");
                self.undo(&mut ctx.link, order.id, &reserved, Outcome::Failed)
            }
        }
    }

    /// Insert the order, decrement every line without a stock check, capture
    fn place(&self, ctx: &mut WorkerContext, order: &Order, reserved: &mut Reserved) -> TallyResult<()> {
        let link = &mut ctx.link;
        self.store.insert_order(link, order.clone())?;
        for line in &order.lines {
            self.adjust(link, &line.sku, -line.qty)?;
            reserved.push((line.sku.clone(), line.qty));
        }
        self.store.insert_payment(
            link,
            Payment {
                order_id: order.id,
                status: PaymentStatus::Captured,
                amount: order.total,
            },
        )
    }

    /// Run compensation; `outcome` is reported if it completes
    fn undo(&self, link: &mut Link, id: OrderId, reserved: &Reserved, outcome: Outcome) -> OperationReport {
        match self.compensate(link, id, reserved) {
            Ok(stale) => OperationReport::new(outcome).with_stale_read(stale),
            Err(e) => {
                debug!(target: "tally::adapter", order = %id, error = %e, "compensation failed");
                OperationReport::new(Outcome::Failed)
            }
        }
    }

    /// Cancel, refund, restore exactly the reserved units, then probe
    ///
    /// An order whose insert never landed has no projection to probe.
    fn compensate(&self, link: &mut Link, id: OrderId, reserved: &Reserved) -> TallyResult<bool> {
        let inserted = self.store.set_order_status(link, id, OrderStatus::Cancelled)?;
        self.store
            .set_payment_status(link, id, PaymentStatus::Refunded)?;
        for (sku, qty) in reserved {
            self.adjust(link, sku, *qty)?;
        }
        if !inserted {
            return Ok(false);
        }
        self.probe(link, id, OrderStatus::Cancelled)
    }
}

impl BackendAdapter for NaiveAdapter {
    fn name(&self) -> &'static str {
        "wide_column"
    }

    fn strategy(&self) -> Strategy {
        Strategy::NaiveReadModifyWrite
    }

    fn setup(&self, config: &WorkloadConfig) -> TallyResult<()> {
        let items = super::cart::seed_inventory(config);
        self.store.recreate(&items)?;
        info!(target: "tally::adapter", backend = self.name(), skus = items.len(), "backend seeded");
        Ok(())
    }

    fn operate(&self, ctx: &mut WorkerContext) -> OperationReport {
        match ctx.config.scenario {
            Scenario::ConcurrentOrders => self.concurrent_order(ctx).unwrap_or_else(|e| {
                debug!(target: "tally::adapter", error = %e, "operation failed");
                Outcome::Failed.into()
            }),
            Scenario::Rollback => self.rollback_order(ctx),
        }
    }

    fn read_model(&self) -> Option<Arc<dyn ReadModel>> {
        let model: Arc<dyn ReadModel> = self.store.clone();
        Some(model)
    }

    fn audit(&self) -> TallyResult<AuditState> {
        audit_statements(self.store.as_ref())
    }

    fn keyspace(&self) -> Arc<Keyspace> {
        self.store.keyspace_handle()
    }
}
