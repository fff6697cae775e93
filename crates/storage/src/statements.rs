//! Statements shared by the non-transactional backend models
//!
//! Both the wide-column and the document model store orders, payments and the
//! order projection the same way: each statement is individually atomic and
//! nothing spans two statements. Only their inventory statements differ, so
//! those live on the concrete stores.

use crate::keyspace::Keyspace;
use crate::link::Link;
use tally_core::{
    InventoryItem, Order, OrderId, OrderStatus, Payment, PaymentStatus, ProjectionRecord, Row,
    RowKey, TallyResult, TypeTag,
};

/// Per-statement access to the order tables of a backend
pub trait OrderStatements {
    /// Keyspace holding the tables
    fn keyspace(&self) -> &Keyspace;

    /// Charge one statement to `link`, failing if the backend is down
    fn statement(&self, link: &mut Link) -> TallyResult<()> {
        self.keyspace().ensure_reachable()?;
        link.exchange()
    }

    /// Drop every table and seed inventory (idempotent)
    fn recreate(&self, items: &[InventoryItem]) -> TallyResult<()> {
        let keyspace = self.keyspace();
        keyspace.ensure_reachable()?;
        keyspace.clear();
        for item in items {
            keyspace.put(Row::Inventory(item.clone()));
        }
        Ok(())
    }

    /// INSERT an order row
    fn insert_order(&self, link: &mut Link, order: Order) -> TallyResult<()> {
        self.statement(link)?;
        self.keyspace().put(Row::Order(order));
        Ok(())
    }

    /// UPDATE an order's status; `false` if the order does not exist
    fn set_order_status(
        &self,
        link: &mut Link,
        id: OrderId,
        status: OrderStatus,
    ) -> TallyResult<bool> {
        self.statement(link)?;
        let updated = self.keyspace().update(&RowKey::Order(id), |row| match row {
            Row::Order(order) => {
                order.status = status;
                true
            }
            _ => false,
        });
        Ok(updated.is_some())
    }

    /// INSERT a payment row
    fn insert_payment(&self, link: &mut Link, payment: Payment) -> TallyResult<()> {
        self.statement(link)?;
        self.keyspace().put(Row::Payment(payment));
        Ok(())
    }

    /// UPDATE a payment's status; `false` if there is no payment for the order
    fn set_payment_status(
        &self,
        link: &mut Link,
        order_id: OrderId,
        status: PaymentStatus,
    ) -> TallyResult<bool> {
        self.statement(link)?;
        let updated = self
            .keyspace()
            .update(&RowKey::Payment(order_id), |row| match row {
                Row::Payment(payment) => {
                    payment.status = status;
                    true
                }
                _ => false,
            });
        Ok(updated.is_some())
    }

    /// SELECT the projection of one order
    fn projection(&self, link: &mut Link, id: OrderId) -> TallyResult<Option<ProjectionRecord>> {
        self.statement(link)?;
        Ok(self
            .keyspace()
            .get(&RowKey::Projection(id))
            .and_then(|vr| vr.row.as_projection().cloned()))
    }

    /// UPSERT a projection row
    fn upsert_projection(&self, link: &mut Link, record: ProjectionRecord) -> TallyResult<()> {
        self.statement(link)?;
        self.keyspace().put(Row::Projection(record));
        Ok(())
    }

    /// SELECT every order (consistency level ONE; no isolation)
    fn scan_orders(&self, link: &mut Link) -> TallyResult<Vec<Order>> {
        self.statement(link)?;
        Ok(self
            .keyspace()
            .scan(TypeTag::Order)
            .into_iter()
            .filter_map(|vr| match vr.row {
                Row::Order(order) => Some(order),
                _ => None,
            })
            .collect())
    }

    /// SELECT every inventory row
    fn scan_inventory(&self, link: &mut Link) -> TallyResult<Vec<InventoryItem>> {
        self.statement(link)?;
        Ok(self
            .keyspace()
            .scan(TypeTag::Inventory)
            .into_iter()
            .filter_map(|vr| match vr.row {
                Row::Inventory(item) => Some(item),
                _ => None,
            })
            .collect())
    }

    /// SELECT every payment
    fn scan_payments(&self, link: &mut Link) -> TallyResult<Vec<Payment>> {
        self.statement(link)?;
        Ok(self
            .keyspace()
            .scan(TypeTag::Payment)
            .into_iter()
            .filter_map(|vr| match vr.row {
                Row::Payment(payment) => Some(payment),
                _ => None,
            })
            .collect())
    }
}
