//! Latency sample collection
//!
//! Workers append one sample per completed operation. The critical section is
//! a single `Vec::push`; sorting happens once, when a summary is taken after
//! the run.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Append-only set of per-operation latencies in milliseconds
#[derive(Debug, Default)]
pub struct LatencyStats {
    samples: Mutex<Vec<f64>>,
}

/// Latency distribution of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    /// Samples
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Median
    pub p50: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
}

impl LatencyStats {
    /// Empty sample set
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size for an expected sample count
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Append one sample in milliseconds
    #[inline]
    pub fn record(&self, ms: f64) {
        self.samples.lock().push(ms);
    }

    /// Append one elapsed duration
    #[inline]
    pub fn record_duration(&self, elapsed: Duration) {
        self.record(elapsed.as_secs_f64() * 1000.0);
    }

    /// Samples recorded so far
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the samples in arrival order
    pub fn snapshot(&self) -> Vec<f64> {
        self.samples.lock().clone()
    }

    /// Sort once and compute the distribution
    pub fn summary(&self) -> LatencySummary {
        let mut sorted = self.snapshot();
        sorted.sort_by(|a, b| a.total_cmp(b));
        summarize_sorted(&sorted)
    }
}

/// Distribution of an ascending sample slice
pub fn summarize_sorted(sorted: &[f64]) -> LatencySummary {
    if sorted.is_empty() {
        return LatencySummary::default();
    }
    let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
    LatencySummary {
        count: sorted.len(),
        mean,
        p50: percentile(sorted, 0.50),
        p95: percentile(sorted, 0.95),
        p99: percentile(sorted, 0.99),
    }
}

/// Nearest-rank percentile of an ascending slice
///
/// Rank is `round(p * (n - 1))`, 0-indexed, half rounded up. An empty slice
/// yields 0.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let last = sorted.len() - 1;
    let rank = (p.clamp(0.0, 1.0) * last as f64).round() as usize;
    sorted[rank.min(last)]
}
