//! Operation outcomes and their shared tallies
//!
//! Every `operate()` call ends in exactly one terminal [`Outcome`]. Conflict
//! aborts and stale reads are annotations carried alongside it, so the sum
//! of the terminal counters always equals the number of completed
//! operations.
//!
//! # Memory Ordering
//!
//! All counters use Relaxed ordering: they synchronize nothing else, and the
//! runner only reads them after every worker has been joined.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Terminal outcome of one logical operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Reserved, paid and committed
    Success,
    /// Insufficient stock; not retried
    OutOfStock,
    /// Conflict retry budget exhausted
    GaveUp,
    /// Backend or connection failure
    Failed,
    /// Late failure undone by compensation
    Compensated,
}

/// What one `operate()` call reports back to the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationReport {
    /// Terminal outcome
    pub outcome: Outcome,
    /// Serialization conflicts hit along the way
    pub aborts: u32,
    /// The read-your-writes probe saw a stale projection
    pub stale_read: bool,
}

impl OperationReport {
    /// Report with no annotations
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            aborts: 0,
            stale_read: false,
        }
    }

    /// Add conflict aborts
    pub fn with_aborts(mut self, aborts: u32) -> Self {
        self.aborts += aborts;
        self
    }

    /// Flag a stale read
    pub fn with_stale_read(mut self, stale: bool) -> Self {
        self.stale_read |= stale;
        self
    }
}

impl From<Outcome> for OperationReport {
    fn from(outcome: Outcome) -> Self {
        Self::new(outcome)
    }
}

/// Thread-safe per-outcome tallies, one atomic per field
#[derive(Debug, Default)]
pub struct OutcomeCounters {
    success: AtomicU64,
    out_of_stock: AtomicU64,
    gave_up: AtomicU64,
    failed: AtomicU64,
    compensated: AtomicU64,
    aborts: AtomicU64,
    stale_reads: AtomicU64,
}

/// Point-in-time copy of [`OutcomeCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Successful operations
    pub success: u64,
    /// Out-of-stock operations
    pub out_of_stock: u64,
    /// Operations that exhausted their retries
    pub gave_up: u64,
    /// Operations that hit a backend failure
    pub failed: u64,
    /// Operations compensated after a late failure
    pub compensated: u64,
    /// Serialization conflicts across all operations
    pub aborts: u64,
    /// Stale projection reads
    pub stale_reads: u64,
}

impl CounterSnapshot {
    /// Sum of the terminal outcome counters
    pub fn operations(&self) -> u64 {
        self.success + self.out_of_stock + self.gave_up + self.failed + self.compensated
    }
}

impl OutcomeCounters {
    /// All counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, outcome: Outcome) -> &AtomicU64 {
        match outcome {
            Outcome::Success => &self.success,
            Outcome::OutOfStock => &self.out_of_stock,
            Outcome::GaveUp => &self.gave_up,
            Outcome::Failed => &self.failed,
            Outcome::Compensated => &self.compensated,
        }
    }

    /// Tally one completed operation
    #[inline]
    pub fn record(&self, report: &OperationReport) {
        self.slot(report.outcome).fetch_add(1, Ordering::Relaxed);
        if report.aborts > 0 {
            self.aborts
                .fetch_add(u64::from(report.aborts), Ordering::Relaxed);
        }
        if report.stale_read {
            self.stale_reads.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count for one outcome
    pub fn get(&self, outcome: Outcome) -> u64 {
        self.slot(outcome).load(Ordering::Relaxed)
    }

    /// Copy every counter
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            success: self.success.load(Ordering::Relaxed),
            out_of_stock: self.out_of_stock.load(Ordering::Relaxed),
            gave_up: self.gave_up.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            compensated: self.compensated.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
            stale_reads: self.stale_reads.load(Ordering::Relaxed),
        }
    }
}
