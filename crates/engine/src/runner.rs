//! Worker fan-out and fan-in
//!
//! The runner spawns one OS thread per worker. Each worker loops until the
//! deadline: check the clock, take a pooled connection, call `operate()`
//! once, record the outcome and its latency. An operation in flight when the
//! deadline passes is allowed to finish; no new one is started.
//!
//! The runner never retries anything itself and shares nothing with workers
//! beyond the counters, the latency samples and the pool.

use crate::adapter::{BackendAdapter, WorkerContext};
use crate::config::{saturating_millis, WorkloadConfig};
use crate::counters::{CounterSnapshot, OperationReport, Outcome, OutcomeCounters};
use crate::pool::ConnectionPool;
use crate::stats::{LatencyStats, LatencySummary};
use chrono::{DateTime, Utc};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tally_core::{TallyError, TallyResult};
use tracing::{debug, error, info};

/// Everything the workers produced
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Terminal outcomes and annotations
    pub counters: CounterSnapshot,
    /// Latency distribution of non-failed operations
    pub latency: LatencySummary,
    /// `operate()` calls that returned
    pub completed: u64,
    /// Wall time from first spawn to last join
    pub elapsed: Duration,
    /// Start timestamp
    pub started_at: DateTime<Utc>,
    /// End timestamp
    pub finished_at: DateTime<Utc>,
}

/// Drives one adapter with `config.workers` threads until the deadline
pub struct WorkloadRunner {
    config: Arc<WorkloadConfig>,
    adapter: Arc<dyn BackendAdapter>,
    counters: Arc<OutcomeCounters>,
    latency: Arc<LatencyStats>,
    pool: Arc<ConnectionPool>,
}

impl std::fmt::Debug for WorkloadRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkloadRunner")
            .field("backend", &self.adapter.name())
            .field("workers", &self.config.workers)
            .field("pool_cap", &self.pool.cap())
            .finish()
    }
}

impl WorkloadRunner {
    /// Runner over an adapter that has already been set up
    pub fn new(config: Arc<WorkloadConfig>, adapter: Arc<dyn BackendAdapter>) -> Self {
        let pool = Arc::new(ConnectionPool::new(config.pool_cap));
        Self {
            config,
            adapter,
            counters: Arc::new(OutcomeCounters::new()),
            latency: Arc::new(LatencyStats::new()),
            pool,
        }
    }

    /// Shared outcome counters
    pub fn counters(&self) -> &OutcomeCounters {
        &self.counters
    }

    /// Run every worker to `deadline` and collect the results
    ///
    /// Fails only if a worker thread cannot be spawned; the threads already
    /// started are joined first.
    pub fn run_until(&self, deadline: Instant) -> TallyResult<RunOutput> {
        let base_seed = self.config.base_seed();
        let started = Instant::now();
        let started_at = Utc::now();
        info!(
            target: "tally::runner",
            backend = self.adapter.name(),
            workers = self.config.workers,
            pool_cap = self.pool.cap(),
            seed = base_seed,
            "run started"
        );

        let mut handles: Vec<JoinHandle<u64>> = Vec::with_capacity(self.config.workers);
        let mut spawn_error = None;
        for worker_id in 0..self.config.workers {
            let ctx = WorkerContext::new(worker_id, Arc::clone(&self.config), base_seed);
            let adapter = Arc::clone(&self.adapter);
            let counters = Arc::clone(&self.counters);
            let latency = Arc::clone(&self.latency);
            let pool = Arc::clone(&self.pool);
            let spawned = std::thread::Builder::new()
                .name(format!("tally-worker-{}", worker_id))
                .spawn(move || {
                    worker_loop(ctx, adapter.as_ref(), &counters, &latency, &pool, deadline)
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    spawn_error = Some(e);
                    break;
                }
            }
        }

        let mut completed = 0;
        for handle in handles {
            match handle.join() {
                Ok(n) => completed += n,
                Err(_) => error!(target: "tally::runner", "worker thread panicked outside operate()"),
            }
        }
        if let Some(e) = spawn_error {
            return Err(TallyError::internal(format!("failed to spawn worker: {}", e)));
        }

        let output = RunOutput {
            counters: self.counters.snapshot(),
            latency: self.latency.summary(),
            completed,
            elapsed: started.elapsed(),
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            target: "tally::runner",
            backend = self.adapter.name(),
            operations = completed,
            success = output.counters.success,
            elapsed_ms = saturating_millis(output.elapsed),
            "run finished"
        );
        Ok(output)
    }

    /// Run for the configured duration from now
    pub fn run(&self) -> TallyResult<RunOutput> {
        self.run_until(Instant::now() + self.config.duration())
    }
}

/// One worker: RUNNING until the deadline, then STOPPED
///
/// Returns the number of `operate()` calls it completed.
fn worker_loop(
    mut ctx: WorkerContext,
    adapter: &dyn BackendAdapter,
    counters: &OutcomeCounters,
    latency: &LatencyStats,
    pool: &ConnectionPool,
    deadline: Instant,
) -> u64 {
    let mut completed = 0;
    loop {
        if Instant::now() >= deadline {
            break;
        }
        let Some(connection) = pool.acquire_until(deadline) else {
            break;
        };

        let t0 = Instant::now();
        let report = match catch_unwind(AssertUnwindSafe(|| adapter.operate(&mut ctx))) {
            Ok(report) => report,
            Err(e) => {
                error!(
                    target: "tally::runner",
                    worker = ctx.worker_id,
                    "operate panicked: {:?}",
                    e.downcast_ref::<&str>().copied().unwrap_or("(non-string panic)")
                );
                OperationReport::new(Outcome::Failed)
            }
        };
        let elapsed = t0.elapsed();
        drop(connection);

        if report.outcome != Outcome::Failed {
            latency.record_duration(elapsed);
        }
        counters.record(&report);
        completed += 1;
    }
    debug!(target: "tally::runner", worker = ctx.worker_id, completed, "worker stopped");
    completed
}
