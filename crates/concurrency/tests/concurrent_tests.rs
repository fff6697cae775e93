//! Concurrent/Multi-threaded Tests for tally-concurrency
//!
//! These tests run real threads against one `SerializableStore`:
//!
//! 1. **First-Committer-Wins** - racing read-modify-writes, one survives
//! 2. **No Lost Updates** - retried decrements account for every unit
//! 3. **Version Monotonicity** - commit versions only move forward
//!
//! ```bash
//! cargo test -p tally-concurrency --test concurrent_tests
//! ```

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use tally_concurrency::SerializableStore;
use tally_core::{InventoryItem, Row, Sku, TallyResult};
use tally_storage::{Link, LinkConfig};

// ============================================================================
// Test Helpers
// ============================================================================

fn seeded(skus: usize, stock: i64) -> Arc<SerializableStore> {
    let store = Arc::new(SerializableStore::new("serializable"));
    let items: Vec<_> = (0..skus)
        .map(|i| InventoryItem::seeded(Sku::hot(i), stock))
        .collect();
    store.recreate(&items).unwrap();
    store
}

/// Take one unit of `sku` if any is left
fn take_one(store: &SerializableStore, link: &mut Link, sku: &Sku) -> TallyResult<bool> {
    store.transaction(link, |txn| {
        let Some(mut item) = txn.get_inventory(sku)? else {
            return Ok(false);
        };
        if item.available < 1 {
            return Ok(false);
        }
        item.available -= 1;
        txn.put(Row::Inventory(item))?;
        Ok(true)
    })
}

// ============================================================================
// First-Committer-Wins
// ============================================================================

#[test]
fn test_racing_decrements_exactly_one_commits() {
    let store = seeded(1, 10);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut link = Link::new(LinkConfig::loopback(), i);
                let mut txn = store.begin(&mut link).unwrap();
                let mut item = txn.get_inventory(&Sku::hot(0)).unwrap().unwrap();
                barrier.wait();
                item.available -= 1;
                txn.put(Row::Inventory(item)).unwrap();
                // Both have read before either commits
                barrier.wait();
                store.commit(txn)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let committed = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.is_conflict()))
        .count();
    assert_eq!(committed, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(store.inventory().unwrap()[0].available, 9);
    assert_eq!(store.stats().conflicts, 1);
}

// ============================================================================
// No Lost Updates
// ============================================================================

#[test]
fn test_retried_decrements_never_oversell() {
    const THREADS: u64 = 8;
    let store = seeded(2, 100);
    let sold = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let store = Arc::clone(&store);
            let sold = Arc::clone(&sold);
            thread::spawn(move || {
                let config = LinkConfig::default().with_round_trip_us(5).with_jitter_us(5);
                let mut link = Link::new(config, i);
                let sku = Sku::hot((i % 2) as usize);
                for _ in 0..40 {
                    loop {
                        match take_one(&store, &mut link, &sku) {
                            Ok(true) => {
                                sold.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                            Ok(false) => break,
                            Err(e) if e.is_conflict() => continue,
                            Err(e) => panic!("unexpected error: {}", e),
                        }
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // 8 threads x 40 attempts over 200 units: everything sells, nothing more
    let remaining: i64 = store.inventory().unwrap().iter().map(|i| i.available).sum();
    assert_eq!(remaining, 0);
    assert_eq!(sold.load(Ordering::Relaxed), 200);
}

// ============================================================================
// Version Monotonicity
// ============================================================================

#[test]
fn test_commit_versions_increase_per_thread() {
    let store = seeded(4, 1_000);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let store = Arc::clone(&store);
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                let mut link = Link::new(LinkConfig::loopback(), i);
                let sku = Sku::hot(i as usize);
                let mut last = 0;
                for _ in 0..50 {
                    let mut txn = store.begin(&mut link).unwrap();
                    let mut item = txn.get_inventory(&sku).unwrap().unwrap();
                    item.available -= 1;
                    txn.put(Row::Inventory(item)).unwrap();
                    // Disjoint SKUs never conflict
                    let version = store.commit(txn).unwrap();
                    assert!(version > last);
                    last = version;
                    seen.lock().push(version);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let mut versions = seen.lock().clone();
    let total = versions.len();
    versions.sort_unstable();
    versions.dedup();
    assert_eq!(versions.len(), total, "two commits shared a version");
    assert_eq!(store.stats().commits, 200);
}
