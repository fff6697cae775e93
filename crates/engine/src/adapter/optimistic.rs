//! Optimistic-retry adapter over the serializable store
//!
//! Each logical step is one serializable transaction wrapped in
//! [`retry_on_conflict`]. The inventory guard `available >= qty` is evaluated
//! inside the transaction, so validation at commit rejects any decrement
//! computed from a stale read.

use super::cart::{cart_for, seed_inventory};
use super::{AuditState, BackendAdapter, Strategy, WorkerContext};
use crate::config::{Scenario, WorkloadConfig};
use crate::counters::{OperationReport, Outcome};
use crate::retry::{retry_on_conflict, RetryOutcome};
use smallvec::SmallVec;
use std::sync::Arc;
use tally_concurrency::{SerializableStore, Transaction};
use tally_core::{
    InventoryItem, Order, OrderId, OrderLine, OrderStatus, Payment, PaymentStatus, Row,
    TallyError, TallyResult,
};
use tally_storage::Keyspace;
use tracing::{debug, info};

/// Result of the placing transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placed {
    /// Stock reserved and payment captured
    Reserved,
    /// Guard failed; order committed as CANCELLED
    OutOfStock,
}

/// Strict backend: serializable transactions with conflict retry
#[derive(Debug)]
pub struct OptimisticAdapter {
    store: SerializableStore,
}

impl Default for OptimisticAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimisticAdapter {
    /// Adapter over an empty store
    pub fn new() -> Self {
        Self {
            store: SerializableStore::new("serializable"),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &SerializableStore {
        &self.store
    }

    fn retry<T, F>(&self, ctx: &mut WorkerContext, mut body: F) -> RetryOutcome<T>
    where
        F: FnMut(&mut Transaction<'_>) -> TallyResult<T>,
    {
        let retry = ctx.config.retry.clone();
        let link = &mut ctx.link;
        retry_on_conflict(&retry, || self.store.transaction(link, &mut body))
    }

    /// Insert the order, reserve every line, capture the payment
    ///
    /// With `final_status` set the order is written in that status straight
    /// away; otherwise it stays PENDING for a later transaction to settle.
    fn place(
        &self,
        ctx: &mut WorkerContext,
        order: &Order,
        final_status: Option<OrderStatus>,
    ) -> RetryOutcome<Placed> {
        self.retry(ctx, |txn| {
            if !reserve_lines(txn, &order.lines)? {
                let mut cancelled = order.clone();
                cancelled.status = OrderStatus::Cancelled;
                txn.put(Row::Order(cancelled))?;
                return Ok(Placed::OutOfStock);
            }
            let mut placed = order.clone();
            if let Some(status) = final_status {
                placed.status = status;
            }
            txn.put(Row::Order(placed))?;
            txn.put(Row::Payment(Payment {
                order_id: order.id,
                status: PaymentStatus::Captured,
                amount: order.total,
            }))?;
            Ok(Placed::Reserved)
        })
    }

    fn concurrent_order(&self, ctx: &mut WorkerContext) -> OperationReport {
        let order = Order::pending(ctx.new_order_id(), cart_for(&mut ctx.rng, &ctx.config));
        let placed = self.place(ctx, &order, Some(OrderStatus::Paid));
        match placed.result {
            Ok(Placed::Reserved) => OperationReport::new(Outcome::Success),
            Ok(Placed::OutOfStock) => OperationReport::new(Outcome::OutOfStock),
            Err(e) => failure_report(&e, 0),
        }
        .with_aborts(placed.aborts)
    }

    fn rollback_order(&self, ctx: &mut WorkerContext) -> OperationReport {
        let order = Order::pending(ctx.new_order_id(), cart_for(&mut ctx.rng, &ctx.config));
        let placed = self.place(ctx, &order, None);
        let mut aborts = placed.aborts;
        match placed.result {
            Ok(Placed::Reserved) => {}
            Ok(Placed::OutOfStock) => {
                return OperationReport::new(Outcome::OutOfStock).with_aborts(aborts)
            }
            Err(e) => return failure_report(&e, aborts),
        }

        if ctx.late_failure() {
            debug!(target: "tally::adapter", order = %order.id, "late failure, compensating");
            let undo = self.retry(ctx, |txn| compensate(txn, order.id, &order.lines));
            aborts += undo.aborts;
            return match undo.result {
                Ok(()) => OperationReport::new(Outcome::Compensated).with_aborts(aborts),
                Err(e) => failure_report(&e, aborts),
            };
        }

        let settle = self.retry(ctx, |txn| set_order_status(txn, order.id, OrderStatus::Paid));
        aborts += settle.aborts;
        match settle.result {
            Ok(()) => OperationReport::new(Outcome::Success).with_aborts(aborts),
            Err(e) => failure_report(&e, aborts),
        }
    }
}

/// Exhausted conflicts give up; anything else failed
fn failure_report(e: &TallyError, aborts: u32) -> OperationReport {
    let outcome = if e.is_conflict() {
        Outcome::GaveUp
    } else {
        Outcome::Failed
    };
    debug!(target: "tally::adapter", error = %e, ?outcome, "operation did not complete");
    OperationReport::new(outcome).with_aborts(aborts)
}

/// Check and decrement every line inside `txn`
///
/// All lines are checked before anything is written, so a failed guard
/// leaves no partial reservation in the transaction.
fn reserve_lines(txn: &mut Transaction<'_>, lines: &[OrderLine]) -> TallyResult<bool> {
    let mut items: SmallVec<[InventoryItem; 3]> = SmallVec::new();
    for line in lines {
        let idx = match items.iter().position(|item| item.sku == line.sku) {
            Some(idx) => idx,
            None => match txn.get_inventory(&line.sku)? {
                Some(item) => {
                    items.push(item);
                    items.len() - 1
                }
                None => return Ok(false),
            },
        };
        if items[idx].available < line.qty {
            return Ok(false);
        }
        items[idx].available -= line.qty;
    }
    for item in items {
        txn.put(Row::Inventory(item))?;
    }
    Ok(true)
}

fn set_order_status(txn: &mut Transaction<'_>, id: OrderId, status: OrderStatus) -> TallyResult<()> {
    let mut order = txn
        .get_order(id)?
        .ok_or_else(|| TallyError::NotFound(format!("order {}", id)))?;
    order.status = status;
    txn.put(Row::Order(order))
}

/// Cancel the order, refund the payment, give back every reserved unit
fn compensate(txn: &mut Transaction<'_>, id: OrderId, lines: &[OrderLine]) -> TallyResult<()> {
    set_order_status(txn, id, OrderStatus::Cancelled)?;
    if let Some(mut payment) = txn.get_payment(id)? {
        payment.status = PaymentStatus::Refunded;
        txn.put(Row::Payment(payment))?;
    }
    for line in lines {
        // Reads see this transaction's earlier restores of the same SKU
        if let Some(mut item) = txn.get_inventory(&line.sku)? {
            item.available += line.qty;
            txn.put(Row::Inventory(item))?;
        }
    }
    Ok(())
}

impl BackendAdapter for OptimisticAdapter {
    fn name(&self) -> &'static str {
        "serializable"
    }

    fn strategy(&self) -> Strategy {
        Strategy::OptimisticRetry
    }

    fn setup(&self, config: &WorkloadConfig) -> TallyResult<()> {
        let items = seed_inventory(config);
        self.store.recreate(&items)?;
        info!(target: "tally::adapter", backend = self.name(), skus = items.len(), "backend seeded");
        Ok(())
    }

    fn operate(&self, ctx: &mut WorkerContext) -> OperationReport {
        match ctx.config.scenario {
            Scenario::ConcurrentOrders => self.concurrent_order(ctx),
            Scenario::Rollback => self.rollback_order(ctx),
        }
    }

    fn audit(&self) -> TallyResult<AuditState> {
        let stats = self.store.stats();
        info!(
            target: "tally::adapter",
            backend = self.name(),
            commits = stats.commits,
            conflicts = stats.conflicts,
            rollbacks = stats.rollbacks,
            "transaction totals"
        );
        Ok(AuditState {
            inventory: self.store.inventory()?,
            orders: self.store.orders()?,
            payments: self.store.payments()?,
        })
    }

    fn keyspace(&self) -> Arc<Keyspace> {
        self.store.keyspace_handle()
    }
}
