//! Atomic conditional-update adapter over the document store
//!
//! Each reservation is one `find_one_and_update` guarded by
//! `available >= qty`, so inventory never goes negative. The reservation,
//! the payment and the status update are still separate statements: a
//! failure between them leaves state that only compensation repairs.

use super::cart::{cart_for, seed_inventory, Reserved};
use super::{audit_statements, AuditState, BackendAdapter, ReadModel, Strategy, WorkerContext};
use crate::config::{Scenario, WorkloadConfig};
use crate::counters::{OperationReport, Outcome};
use std::sync::Arc;
use tally_core::{Order, OrderId, OrderStatus, Payment, PaymentStatus, TallyResult};
use tally_storage::{DocumentStore, Keyspace, Link, OrderStatements};
use tracing::{debug, info};

/// How far placing an order got
enum Placement {
    /// Every line reserved and payment captured
    Captured,
    /// A guard failed after `Reserved` lines were taken
    Short,
}

/// Document backend: single-document atomic updates
#[derive(Debug)]
pub struct AtomicAdapter {
    store: Arc<DocumentStore>,
}

impl Default for AtomicAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicAdapter {
    /// Adapter over an empty store
    pub fn new() -> Self {
        Self {
            store: Arc::new(DocumentStore::new("document")),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    fn place(&self, link: &mut Link, order: &Order, reserved: &mut Reserved) -> TallyResult<Placement> {
        self.store.insert_order(link, order.clone())?;
        for line in &order.lines {
            if self.store.reserve(link, &line.sku, line.qty)?.is_none() {
                return Ok(Placement::Short);
            }
            reserved.push((line.sku.clone(), line.qty));
        }
        self.store.insert_payment(
            link,
            Payment {
                order_id: order.id,
                status: PaymentStatus::Captured,
                amount: order.total,
            },
        )?;
        Ok(Placement::Captured)
    }

    fn concurrent_order(&self, ctx: &mut WorkerContext) -> TallyResult<OperationReport> {
        let order = Order::pending(ctx.new_order_id(), cart_for(&mut ctx.rng, &ctx.config));
        let mut reserved = Reserved::new();
        let link = &mut ctx.link;
        match self.place(link, &order, &mut reserved)? {
            Placement::Captured => {
                self.store.set_order_status(link, order.id, OrderStatus::Paid)?;
                Ok(Outcome::Success.into())
            }
            Placement::Short => {
                for (sku, qty) in &reserved {
                    self.store.increment_available(link, sku, *qty)?;
                }
                self.store
                    .set_order_status(link, order.id, OrderStatus::Cancelled)?;
                Ok(Outcome::OutOfStock.into())
            }
        }
    }

    fn rollback_order(&self, ctx: &mut WorkerContext) -> OperationReport {
        let order = Order::pending(ctx.new_order_id(), cart_for(&mut ctx.rng, &ctx.config));
        let mut reserved = Reserved::new();
        let placed = self.place(&mut ctx.link, &order, &mut reserved);

        let outcome = match placed {
            Ok(Placement::Captured) if !ctx.late_failure() => {
                let link = &mut ctx.link;
                let settled = self
                    .store
                    .set_order_status(link, order.id, OrderStatus::Paid)
                    .and_then(|_| self.probe(link, order.id, OrderStatus::Paid));
                match settled {
                    Ok(stale) => {
                        return OperationReport::new(Outcome::Success).with_stale_read(stale)
                    }
                    Err(e) => {
                        debug!(target: "tally::adapter", error = %e, "settle failed");
                        Outcome::Failed
                    }
                }
            }
            Ok(Placement::Captured) => Outcome::Compensated,
            Ok(Placement::Short) => Outcome::OutOfStock,
            Err(e) => {
                debug!(target: "tally::adapter", error = %e, "placement failed");
                Outcome::Failed
            }
        };

        match self.compensate(&mut ctx.link, order.id, &reserved) {
            Ok(stale) => OperationReport::new(outcome).with_stale_read(stale),
            Err(e) => {
                debug!(target: "tally::adapter", order = %order.id, error = %e, "compensation failed");
                OperationReport::new(Outcome::Failed)
            }
        }
    }

    fn probe(&self, link: &mut Link, id: OrderId, expected: OrderStatus) -> TallyResult<bool> {
        Ok(self
            .store
            .projection(link, id)?
            .map_or(true, |record| record.status != expected))
    }

    /// Cancel, refund, `$inc` back exactly the reserved units, then probe
    ///
    /// An order whose insert never landed has no projection to probe.
    fn compensate(&self, link: &mut Link, id: OrderId, reserved: &Reserved) -> TallyResult<bool> {
        let inserted = self.store.set_order_status(link, id, OrderStatus::Cancelled)?;
        self.store
            .set_payment_status(link, id, PaymentStatus::Refunded)?;
        for (sku, qty) in reserved {
            self.store.increment_available(link, sku, *qty)?;
        }
        if !inserted {
            return Ok(false);
        }
        self.probe(link, id, OrderStatus::Cancelled)
    }
}

impl BackendAdapter for AtomicAdapter {
    fn name(&self) -> &'static str {
        "document"
    }

    fn strategy(&self) -> Strategy {
        Strategy::AtomicConditionalUpdate
    }

    fn setup(&self, config: &WorkloadConfig) -> TallyResult<()> {
        let items = seed_inventory(config);
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
