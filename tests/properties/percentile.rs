//! Nearest-rank percentiles over the recorded samples

use proptest::prelude::*;
use tally::{percentile, LatencyStats};

#[test]
fn five_samples() {
    let stats = LatencyStats::new();
    for ms in [30.0, 10.0, 50.0, 20.0, 40.0] {
        stats.record(ms);
    }
    let summary = stats.summary();
    assert_eq!(summary.p50, 30.0);
    assert_eq!(summary.p95, 50.0);
    assert_eq!(summary.mean, 30.0);
}

#[test]
fn empty_set_reports_zero() {
    let summary = LatencyStats::new().summary();
    assert_eq!(summary.count, 0);
    assert_eq!(summary.p50, 0.0);
    assert_eq!(summary.p95, 0.0);
}

proptest! {
    #[test]
    fn percentile_is_a_sample_and_monotone(
        mut samples in prop::collection::vec(0.0f64..10_000.0, 1..200),
    ) {
        samples.sort_by(|a, b| a.total_cmp(b));
        let p50 = percentile(&samples, 0.50);
        let p95 = percentile(&samples, 0.95);
        let p99 = percentile(&samples, 0.99);
        prop_assert!(samples.contains(&p50));
        prop_assert!(p50 <= p95 && p95 <= p99);
        prop_assert_eq!(percentile(&samples, 0.0), samples[0]);
        prop_assert_eq!(percentile(&samples, 1.0), samples[samples.len() - 1]);
    }
}
