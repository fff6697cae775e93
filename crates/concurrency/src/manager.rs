//! Serializable backend model
//!
//! Commit sequence:
//!
//! ```text
//! 1. COMMIT statement on the wire (may fail like any statement)
//! 2. take the commit lock
//! 3. validate_read_set(); on conflict: abort, return TallyError::Conflict
//! 4. allocate one commit version
//! 5. apply every buffered write with that version
//! 6. release the lock, return the version
//! ```
//!
//! Validation and apply happen under the same lock, so a transaction never
//! commits on top of a version it did not see. Statements inside a
//! transaction do not take the lock.

use crate::transaction::{Transaction, TransactionStatus};
use crate::validation::validate_read_set;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tally_core::{InventoryItem, Order, Payment, Row, TallyResult, TypeTag};
use tally_storage::{Keyspace, Link, VersionedRow};
use tracing::debug;

/// Commit/conflict tallies since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    /// Transactions committed
    pub commits: u64,
    /// Transactions rejected by validation
    pub conflicts: u64,
    /// Transactions rolled back by the caller or by a failed statement
    pub rollbacks: u64,
}

/// Store with serializable multi-row transactions
pub struct SerializableStore {
    keyspace: Arc<Keyspace>,
    commit_lock: Mutex<()>,
    next_txn_id: AtomicU64,
    commits: AtomicU64,
    conflicts: AtomicU64,
    rollbacks: AtomicU64,
}

impl SerializableStore {
    /// Create an empty store
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            keyspace: Arc::new(Keyspace::new(name)),
            commit_lock: Mutex::new(()),
            next_txn_id: AtomicU64::new(1),
            commits: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
        }
    }

    /// Shared handle to the underlying keyspace
    pub fn keyspace_handle(&self) -> Arc<Keyspace> {
        Arc::clone(&self.keyspace)
    }

    /// Open a transaction (one BEGIN statement)
    pub fn begin<'a>(&'a self, link: &'a mut Link) -> TallyResult<Transaction<'a>> {
        self.keyspace.ensure_reachable()?;
        link.exchange()?;
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::Relaxed);
        Ok(Transaction::new(txn_id, &self.keyspace, link))
    }

    /// Validate and apply a transaction
    ///
    /// Returns the commit version. Read-only transactions allocate no
    /// version and return the current one.
    pub fn commit(&self, mut txn: Transaction<'_>) -> TallyResult<u64> {
        if let Err(e) = self
            .keyspace
            .ensure_reachable()
            .and_then(|_| txn.link.exchange())
        {
            txn.mark_aborted(format!("commit statement failed: {}", e));
            self.rollbacks.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }

        let _guard = self.commit_lock.lock();

        if let Err(e) = validate_read_set(&txn.read_set, &self.keyspace).into_result() {
            debug!(target: "tally::txn", txn_id = txn.txn_id, error = %e, "serialization conflict");
            txn.mark_aborted(e.to_string());
            self.conflicts.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }

        let version = if txn.write_set.is_empty() {
            self.keyspace.current_version()
        } else {
            let version = self.keyspace.next_version();
            for (_, row) in txn.write_set.drain() {
                self.keyspace.put_with_version(row, version);
            }
            version
        };
        txn.status = TransactionStatus::Committed;
        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(version)
    }

    /// Discard a transaction (one ROLLBACK statement, best effort)
    pub fn rollback(&self, mut txn: Transaction<'_>) {
        let _ = txn.link.exchange();
        txn.mark_aborted("rolled back");
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Run `f` inside a transaction and commit it
    ///
    /// If `f` fails the transaction is rolled back and its error returned.
    /// No retry here; conflicts surface as `TallyError::Conflict`.
    pub fn transaction<T, F>(&self, link: &mut Link, f: F) -> TallyResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> TallyResult<T>,
    {
        let mut txn = self.begin(link)?;
        match f(&mut txn) {
            Ok(value) => {
                self.commit(txn)?;
                Ok(value)
            }
            Err(e) => {
                self.rollback(txn);
                Err(e)
            }
        }
    }

    /// Drop every table, reset the tallies and seed inventory (idempotent)
    pub fn recreate(&self, items: &[InventoryItem]) -> TallyResult<()> {
        self.keyspace.ensure_reachable()?;
        let _guard = self.commit_lock.lock();
        self.keyspace.clear();
        for tally in [&self.commits, &self.conflicts, &self.rollbacks] {
            tally.store(0, Ordering::Relaxed);
        }
        let version = self.keyspace.next_version();
        for item in items {
            self.keyspace
                .put_with_version(Row::Inventory(item.clone()), version);
        }
        Ok(())
    }

    /// Committed rows of one table, consistent with respect to commits
    pub fn snapshot(&self, tag: TypeTag) -> TallyResult<Vec<VersionedRow>> {
        self.keyspace.ensure_reachable()?;
        let _guard = self.commit_lock.lock();
        Ok(self.keyspace.scan(tag))
    }

    /// Committed inventory rows
    pub fn inventory(&self) -> TallyResult<Vec<InventoryItem>> {
        Ok(self
            .snapshot(TypeTag::Inventory)?
            .into_iter()
            .filter_map(|vr| vr.row.as_inventory().cloned())
            .collect())
    }

    /// Committed order rows
    pub fn orders(&self) -> TallyResult<Vec<Order>> {
        Ok(self
            .snapshot(TypeTag::Order)?
            .into_iter()
            .filter_map(|vr| vr.row.as_order().cloned())
            .collect())
    }

    /// Committed payment rows
    pub fn payments(&self) -> TallyResult<Vec<Payment>> {
        Ok(self
            .snapshot(TypeTag::Payment)?
            .into_iter()
            .filter_map(|vr| vr.row.as_payment().cloned())
            .collect())
    }

    /// Commit/conflict tallies
    pub fn stats(&self) -> TransactionStats {
        TransactionStats {
            commits: self.commits.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for SerializableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializableStore")
            .field("keyspace", &self.keyspace)
            .field("stats", &self.stats())
            .finish()
    }
}
