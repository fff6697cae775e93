//! Wide-column backend model
//!
//! Statement-level last-writer-wins semantics: a read returns whatever was
//! written last, a write overwrites the column blindly. There is no
//! compare-and-set, so a client-side read-modify-write loses updates under
//! concurrency.

use crate::keyspace::Keyspace;
use crate::link::Link;
use crate::statements::OrderStatements;
use std::sync::Arc;
use tally_core::{Row, RowKey, Sku, TallyError, TallyResult};

/// Last-writer-wins store
#[derive(Debug, Clone)]
pub struct WideColumnStore {
    keyspace: Arc<Keyspace>,
}

impl WideColumnStore {
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

    /// `SELECT available FROM inventory_by_sku WHERE sku = ?`
    ///
    /// A missing row reads as 0.
    pub fn read_available(&self, link: &mut Link, sku: &Sku) -> TallyResult<i64> {
        self.statement(link)?;
        Ok(self
            .keyspace
            .get(&RowKey::Inventory(sku.clone()))
            .and_then(|vr| vr.row.as_inventory().map(|item| item.available))
            .unwrap_or(0))
    }

    /// `UPDATE inventory_by_sku SET available = ? WHERE sku = ?`
    pub fn write_available(&self, link: &mut Link, sku: &Sku, available: i64) -> TallyResult<()> {
        self.statement(link)?;
        self.keyspace
            .update(&RowKey::Inventory(sku.clone()), |row| match row {
                Row::Inventory(item) => {
                    item.available = available;
                    true
                }
                _ => false,
            })
            .map(|_| ())
            .ok_or_else(|| TallyError::NotFound(format!("inventory row {}", sku)))
    }
}

impl OrderStatements for WideColumnStore {
    fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }
}
