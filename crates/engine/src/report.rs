//! Flat KPI record of one benchmark run
//!
//! One `KpiReport` per backend per run, serializable to JSON so runs can be
//! compared offline.

use crate::adapter::Strategy;
use crate::config::{saturating_millis, Scenario, WorkloadConfig};
use crate::runner::RunOutput;
use crate::stats::LatencySummary;
use crate::verifier::CorrectnessReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::TallyResult;

/// Every KPI of one run, flat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiReport {
    /// Backend name
    pub backend: String,
    /// Concurrency-control strategy
    pub strategy: Strategy,
    /// Workload scenario
    pub scenario: Scenario,
    /// Worker threads
    pub workers: usize,
    /// Configured run length in milliseconds
    pub duration_ms: u64,
    /// Base seed of every RNG in the run
    pub seed: Option<u64>,
    /// Wall time the workers actually ran, in milliseconds
    pub elapsed_ms: u64,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: DateTime<Utc>,

    /// Completed `operate()` calls
    pub operations: u64,
    /// Orders in PAID state after the run
    pub paid_orders: u64,
    /// Stock left across all keys
    pub available_end: i64,

    /// At least one key is oversold
    pub oversell_event: bool,
    /// Oversold keys
    pub oversell_events: u64,
    /// CAPTURED payments without a PAID order
    pub orphan_payments: u64,

    /// Successful operations per configured second
    pub throughput_succ_per_s: f64,
    /// Latency of non-failed operations
    pub latency_ms: LatencySummary,

    /// Operations that found no stock
    pub out_of_stock: u64,
    /// Operations that hit a backend failure
    pub failed: u64,
    /// Operations that exhausted their conflict retries
    pub gave_up: u64,
    /// Serialization conflicts across all operations
    #[serde(rename = "abort")]
    pub retries_total: u64,
    /// `abort / (operations + abort)`
    pub abort_rate: f64,
    /// Successful operations
    pub orders_ok: u64,
    /// Late failures undone by compensation
    pub compensations: u64,
    /// Read-your-writes probes that saw a stale projection
    pub stale_reads: u64,
}

impl KpiReport {
    /// Combine run output and audit into one record
    pub fn assemble(
        config: &WorkloadConfig,
        backend: &str,
        strategy: Strategy,
        run: &RunOutput,
        audit: &CorrectnessReport,
    ) -> Self {
        let counters = &run.counters;
        let attempts = run.completed + counters.aborts;
        let abort_rate = if attempts == 0 {
            0.0
        } else {
            counters.aborts as f64 / attempts as f64
        };
        let seconds = config.duration().as_secs_f64();
        let throughput = if seconds > 0.0 {
            counters.success as f64 / seconds
        } else {
            0.0
        };

        Self {
            backend: backend.to_string(),
            strategy,
            scenario: config.scenario,
            workers: config.workers,
            duration_ms: config.duration_ms,
            seed: config.seed,
            elapsed_ms: saturating_millis(run.elapsed),
            started_at: run.started_at,
            finished_at: run.finished_at,
            operations: run.completed,
            paid_orders: audit.paid_orders,
            available_end: audit.available_end,
            oversell_event: audit.oversell_event,
            oversell_events: audit.oversell_events,
            orphan_payments: audit.orphan_payments,
            throughput_succ_per_s: throughput,
            latency_ms: run.latency,
            out_of_stock: counters.out_of_stock,
            failed: counters.failed,
            gave_up: counters.gave_up,
            retries_total: counters.aborts,
            abort_rate,
            orders_ok: counters.success,
            compensations: counters.compensated,
            stale_reads: audit.stale_reads,
        }
    }

    /// Compact JSON
    pub fn to_json(&self) -> TallyResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Indented JSON
    pub fn to_json_pretty(&self) -> TallyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
