//! Document backend model
//!
//! Each document update is atomic: `find_one_and_update` evaluates its guard
//! and applies its change under the document's lock, the storage-level
//! equivalent of compare-and-swap. Nothing is atomic across documents, so a
//! reservation and the payment that follows it can still be separated by a
//! failure.

use crate::keyspace::Keyspace;
use crate::link::Link;
use crate::statements::OrderStatements;
use std::sync::Arc;
use tally_core::{InventoryItem, Row, RowKey, Sku, TallyResult};

/// Store with single-document atomic updates
#[derive(Debug, Clone)]
pub struct DocumentStore {
    keyspace: Arc<Keyspace>,
}

impl DocumentStore {
    /// Create an empty store
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            keyspace: Arc::new(Keyspace::new(name)),
        }
    }

    /// Shared handle to the underlying keyspace
    pub fn keyspace_handle(&self) -> Arc<Keyspace> {
        Arc::clone(&self.keyspace)
    }

    /// `find_one_and_update({sku, available: {$gte: qty}}, {$inc: {available: -qty}})`
    ///
    /// Returns the document as it was before the update, or `None` when the
    /// guard did not match (missing SKU or insufficient stock).
    pub fn reserve(
        &self,
        link: &mut Link,
        sku: &Sku,
        qty: i64,
    ) -> TallyResult<Option<InventoryItem>> {
        self.statement(link)?;
        let mut before = None;
        self.keyspace
            .update(&RowKey::Inventory(sku.clone()), |row| match row {
                Row::Inventory(item) if item.available >= qty => {
                    before = Some(item.clone());
                    item.available -= qty;
                    true
                }
                _ => false,
            });
        Ok(before)
    }

    /// `update_one({sku}, {$inc: {available: delta}})`
    ///
    /// Returns `false` if the SKU does not exist.
    pub fn increment_available(&self, link: &mut Link, sku: &Sku, delta: i64) -> TallyResult<bool> {
        self.statement(link)?;
        let updated = self
            .keyspace
            .update(&RowKey::Inventory(sku.clone()), |row| match row {
                Row::Inventory(item) => {
                    item.available += delta;
                    true
                }
                _ => false,
            });
        Ok(updated.is_some())
    }
}

impl OrderStatements for DocumentStore {
    fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }
}
