//! Sharded versioned row storage
//!
//! Every backend model keeps its tables in one `Keyspace`.
//!
//! # Design
//!
//! - DashMap: sharded by key hash, readers only take a shard read lock
//! - FxHash: fast non-crypto hash for `RowKey`
//! - One store-wide version counter, bumped by every mutation
//!
//! A row's version is the value of the counter when it was last written.
//! The serializable model validates read sets against these versions; the
//! weak models ignore them.
//!
//! # Reachability
//!
//! A keyspace can be switched to unreachable to model a backend that is down.
//! Callers check it through [`Keyspace::ensure_reachable`] before each statement.

use dashmap::DashMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tally_core::{Row, RowKey, TallyError, TallyResult, TypeTag};
use tracing::warn;

type FxBuild = BuildHasherDefault<FxHasher>;

/// A row together with the version that wrote it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedRow {
    /// Row payload
    pub row: Row,
    /// Store version of the last write
    pub version: u64,
}

/// Sharded row store shared by all connections of one backend
pub struct Keyspace {
    name: String,
    rows: DashMap<RowKey, VersionedRow, FxBuild>,
    version: AtomicU64,
    reachable: AtomicBool,
}

impl Keyspace {
    /// Create an empty, reachable keyspace
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: DashMap::with_hasher(FxBuild::default()),
            version: AtomicU64::new(0),
            reachable: AtomicBool::new(true),
        }
    }

    /// Backend name used in errors and logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current store version
    #[inline]
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Allocate the next store version
    #[inline]
    pub fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Mark the backend as up or down
    pub fn set_reachable(&self, reachable: bool) {
        if self.reachable.swap(reachable, Ordering::AcqRel) != reachable {
            warn!(target: "tally::storage", backend = %self.name, reachable, "reachability changed");
        }
    }

    /// Whether the backend accepts statements
    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }

    /// Fail with `Unreachable` when the backend is down
    pub fn ensure_reachable(&self) -> TallyResult<()> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(TallyError::Unreachable {
                backend: self.name.clone(),
            })
        }
    }

    /// Read a row (cloned out of the shard)
    pub fn get(&self, key: &RowKey) -> Option<VersionedRow> {
        self.rows.get(key).map(|entry| entry.value().clone())
    }

    /// Version of a row, 0 if absent
    pub fn version_of(&self, key: &RowKey) -> u64 {
        self.rows.get(key).map(|entry| entry.version).unwrap_or(0)
    }

    /// Unconditional write, last writer wins
    ///
    /// Returns the version assigned to the write.
    pub fn put(&self, row: Row) -> u64 {
        let version = self.next_version();
        self.put_with_version(row, version);
        version
    }

    /// Write a row with a caller-allocated version
    ///
    /// Used by transactional commit so all rows of one transaction share a version.
    pub fn put_with_version(&self, row: Row, version: u64) {
        let key = row.key();
        self.rows.insert(key, VersionedRow { row, version });
    }

    /// Insert a row that must not exist yet
    pub fn insert_new(&self, row: Row) -> TallyResult<u64> {
        use dashmap::mapref::entry::Entry;

        let key = row.key();
        match self.rows.entry(key) {
            Entry::Occupied(entry) => Err(TallyError::Storage(format!(
                "duplicate key {}",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                let version = self.next_version();
                entry.insert(VersionedRow { row, version });
                Ok(version)
            }
        }
    }

    /// Atomically mutate one row in place
    ///
    /// `f` runs under the row's shard write lock. If it returns `true` the row
    /// gets a new version and `Some(version)` is returned. Missing rows and
    /// `false` both leave the row untouched and return `None`.
    pub fn update<F>(&self, key: &RowKey, f: F) -> Option<u64>
    where
        F: FnOnce(&mut Row) -> bool,
    {
        let mut entry = self.rows.get_mut(key)?;
        if f(&mut entry.row) {
            let version = self.next_version();
            entry.version = version;
            Some(version)
        } else {
            None
        }
    }

    /// Copy out every row of one table
    ///
    /// Each shard is read-locked only while it is visited, so concurrent
    /// writers may land before or after the scan passes them.
    pub fn scan(&self, tag: TypeTag) -> Vec<VersionedRow> {
        self.rows
            .iter()
            .filter(|entry| entry.key().type_tag() == tag)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Drop every row (DROP KEYSPACE)
    pub fn clear(&self) {
        self.rows.clear();
    }

    /// Number of rows across all tables
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the keyspace holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl std::fmt::Debug for Keyspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyspace")
            .field("name", &self.name)
            .field("rows", &self.rows.len())
            .field("version", &self.current_version())
            .field("reachable", &self.is_reachable())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tally_core::{InventoryItem, Sku};

    fn inventory(sku: &str, initial: i64) -> Row {
        Row::Inventory(InventoryItem::seeded(Sku::new(sku), initial))
    }

    #[test]
    fn test_put_and_get() {
        let ks = Keyspace::new("test");
        let v = ks.put(inventory("SKU-000", 5));
        let got = ks.get(&RowKey::Inventory(Sku::new("SKU-000"))).unwrap();
        assert_eq!(got.version, v);
        assert_eq!(got.row.as_inventory().unwrap().available, 5);
    }

    #[test]
    fn test_version_of_missing_is_zero() {
        let ks = Keyspace::new("test");
        assert_eq!(ks.version_of(&RowKey::Inventory(Sku::new("nope"))), 0);
    }

    #[test]
    fn test_versions_increase_per_write() {
        let ks = Keyspace::new("test");
        let v1 = ks.put(inventory("SKU-000", 5));
        let v2 = ks.put(inventory("SKU-000", 4));
        assert!(v2 > v1);
        assert_eq!(ks.current_version(), v2);
    }

    #[test]
    fn test_insert_new_rejects_duplicate() {
        let ks = Keyspace::new("test");
        ks.insert_new(inventory("SKU-000", 5)).unwrap();
        assert!(ks.insert_new(inventory("SKU-000", 5)).is_err());
    }

    #[test]
    fn test_update_false_keeps_version() {
        let ks = Keyspace::new("test");
        let key = RowKey::Inventory(Sku::new("SKU-000"));
        let v = ks.put(inventory("SKU-000", 0));
        assert!(ks.update(&key, |_| false).is_none());
        assert_eq!(ks.version_of(&key), v);
    }

    #[test]
    fn test_update_missing_row() {
        let ks = Keyspace::new("test");
        let key = RowKey::Inventory(Sku::new("SKU-000"));
        assert!(ks.update(&key, |_| true).is_none());
    }

    #[test]
    fn test_scan_filters_by_table() {
        let ks = Keyspace::new("test");
        ks.put(inventory("SKU-000", 1));
        ks.put(inventory("SKU-001", 1));
        assert_eq!(ks.scan(TypeTag::Inventory).len(), 2);
        assert!(ks.scan(TypeTag::Order).is_empty());
    }

    #[test]
    fn test_clear() {
        let ks = Keyspace::new("test");
        ks.put(inventory("SKU-000", 1));
        ks.clear();
        assert!(ks.is_empty());
    }

    #[test]
    fn test_unreachable() {
        let ks = Keyspace::new("down");
        ks.set_reachable(false);
        let err = ks.ensure_reachable().unwrap_err();
        assert!(matches!(err, TallyError::Unreachable { .. }));
        ks.set_reachable(true);
        assert!(ks.ensure_reachable().is_ok());
    }

    #[test]
    fn test_concurrent_updates_are_atomic() {
        let ks = Arc::new(Keyspace::new("test"));
        let key = RowKey::Inventory(Sku::new("SKU-HOT"));
        ks.put(inventory("SKU-HOT", 1000));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ks = Arc::clone(&ks);
                let key = key.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        ks.update(&key, |row| match row {
                            Row::Inventory(item) => {
                                item.available -= 1;
                                true
                            }
                            _ => false,
                        });
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        let item = ks.get(&key).unwrap();
        assert_eq!(item.row.as_inventory().unwrap().available, 200);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn versions_strictly_increase(stocks in prop::collection::vec(0i64..1_000, 1..50)) {
                let ks = Keyspace::new("prop");
                let mut last = ks.current_version();
                for (i, stock) in stocks.iter().enumerate() {
                    let v = ks.put(inventory(&format!("SKU-{:03}", i % 5), *stock));
                    prop_assert!(v > last);
                    last = v;
                }
                prop_assert_eq!(ks.current_version(), last);
                prop_assert_eq!(ks.len(), stocks.len().min(5));
            }
        }
    }
}
