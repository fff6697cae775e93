//! Capped connection pool
//!
//! Caps how many workers talk to the backend at once, independently of the
//! worker count. A worker holds at most one permit at a time and releases it
//! when its operation finishes, so acquisition may block but never deadlocks.

use parking_lot::{Condvar, Mutex};
use std::time::Instant;
use tracing::warn;

/// Counting semaphore over backend connections
#[derive(Debug)]
pub struct ConnectionPool {
    cap: usize,
    in_use: Mutex<usize>,
    released: Condvar,
}

/// A checked-out connection; returned to the pool on drop
#[derive(Debug)]
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
}

impl ConnectionPool {
    /// Pool allowing `cap` connections at once (at least one)
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            in_use: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    /// Maximum concurrent connections
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Connections currently checked out
    pub fn in_use(&self) -> usize {
        *self.in_use.lock()
    }

    /// Check out a connection, waiting no later than `deadline`
    ///
    /// `None` means the deadline passed while every connection was busy.
    pub fn acquire_until(&self, deadline: Instant) -> Option<PooledConnection<'_>> {
        let mut in_use = self.in_use.lock();
        while *in_use >= self.cap {
            if self.released.wait_until(&mut in_use, deadline).timed_out() && *in_use >= self.cap {
                warn!(target: "tally::runner", cap = self.cap, "pool acquisition reached the deadline");
                return None;
            }
        }
        *in_use += 1;
        Some(PooledConnection { pool: self })
    }

    /// Check out a connection without waiting
    pub fn try_acquire(&self) -> Option<PooledConnection<'_>> {
        let mut in_use = self.in_use.lock();
        if *in_use >= self.cap {
            return None;
        }
        *in_use += 1;
        Some(PooledConnection { pool: self })
    }

    fn release(&self) {
        let mut in_use = self.in_use.lock();
        *in_use -= 1;
        self.released.notify_one();
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        self.pool.release();
    }
}
