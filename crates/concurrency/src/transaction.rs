//! Transaction context for OCC
//!
//! A `Transaction` tracks every row it read (with the version it saw) and
//! buffers every row it writes. Nothing becomes visible to other connections
//! until [`SerializableStore::commit`](crate::SerializableStore::commit)
//! validates the read set and applies the buffer under one version.
//!
//! Each `get` and `put` is a statement on the wire and is charged to the
//! connection's link.

use rustc_hash::FxHashMap;
use tally_core::{
    InventoryItem, Order, OrderId, Payment, Row, RowKey, Sku, TallyError, TallyResult,
};
use tally_storage::{Keyspace, Link};

/// Status of a transaction in its lifecycle
///
/// - `Active` → `Committed` (validation passed)
/// - `Active` → `Aborted` (conflict, statement failure or rollback)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Executing statements
    Active,
    /// Writes applied
    Committed,
    /// Discarded
    Aborted {
        /// Human-readable reason
        reason: String,
    },
}

/// An open serializable transaction on one connection
pub struct Transaction<'a> {
    pub(crate) txn_id: u64,
    pub(crate) keyspace: &'a Keyspace,
    pub(crate) link: &'a mut Link,
    pub(crate) read_set: FxHashMap<RowKey, u64>,
    pub(crate) write_set: FxHashMap<RowKey, Row>,
    pub(crate) status: TransactionStatus,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(txn_id: u64, keyspace: &'a Keyspace, link: &'a mut Link) -> Self {
        Self {
            txn_id,
            keyspace,
            link,
            read_set: FxHashMap::default(),
            write_set: FxHashMap::default(),
            status: TransactionStatus::Active,
        }
    }

    /// Transaction identifier
    pub fn txn_id(&self) -> u64 {
        self.txn_id
    }

    /// Current status
    pub fn status(&self) -> &TransactionStatus {
        &self.status
    }

    /// Whether statements are still accepted
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    fn ensure_active(&self) -> TallyResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(TallyError::internal(format!(
                "transaction {} is not active: {:?}",
                self.txn_id, self.status
            )))
        }
    }

    fn statement(&mut self) -> TallyResult<()> {
        self.ensure_active()?;
        self.keyspace.ensure_reachable()?;
        self.link.exchange()
    }

    /// Read a row, recording its version in the read set
    ///
    /// Reads see this transaction's own buffered writes. The first version
    /// observed for a key is the one validated at commit.
    pub fn get(&mut self, key: &RowKey) -> TallyResult<Option<Row>> {
        self.statement()?;
        if let Some(row) = self.write_set.get(key) {
            return Ok(Some(row.clone()));
        }
        let found = self.keyspace.get(key);
        let version = found.as_ref().map(|vr| vr.version).unwrap_or(0);
        self.read_set.entry(key.clone()).or_insert(version);
        Ok(found.map(|vr| vr.row))
    }

    /// Buffer a write
    pub fn put(&mut self, row: Row) -> TallyResult<()> {
        self.statement()?;
        self.write_set.insert(row.key(), row);
        Ok(())
    }

    /// Read an inventory row
    pub fn get_inventory(&mut self, sku: &Sku) -> TallyResult<Option<InventoryItem>> {
        Ok(self
            .get(&RowKey::Inventory(sku.clone()))?
            .and_then(|row| row.as_inventory().cloned()))
    }

    /// Read an order row
    pub fn get_order(&mut self, id: OrderId) -> TallyResult<Option<Order>> {
        Ok(self
            .get(&RowKey::Order(id))?
            .and_then(|row| row.as_order().cloned()))
    }

    /// Read a payment row
    pub fn get_payment(&mut self, order_id: OrderId) -> TallyResult<Option<Payment>> {
        Ok(self
            .get(&RowKey::Payment(order_id))?
            .and_then(|row| row.as_payment().cloned()))
    }

    pub(crate) fn mark_aborted(&mut self, reason: impl Into<String>) {
        self.write_set.clear();
        self.status = TransactionStatus::Aborted {
            reason: reason.into(),
        };
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("txn_id", &self.txn_id)
            .field("keyspace", &self.keyspace.name())
            .field("reads", &self.read_set.len())
            .field("writes", &self.write_set.len())
            .field("status", &self.status)
            .finish()
    }
}
