//! Background projection reconciler
//!
//! Keeps the read model of a weak backend eventually consistent with its
//! primary orders. One thread sweeps until the run deadline: read every
//! order without isolation, maybe lag per record, upsert the projection,
//! sleep the sweep interval. Workers that probe the projection right after
//! their own status write observe the lag as stale reads.

use crate::adapter::ReadModel;
use crate::config::ProjectionConfig;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tally_core::{ProjectionRecord, TallyError, TallyResult};
use tally_storage::{Link, LinkConfig};
use tracing::{debug, error, info};

/// What the reconciler did over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcilerStats {
    /// Sweeps started
    pub sweeps: u64,
    /// Projection records written
    pub records_written: u64,
    /// Sweeps or upserts that hit a backend error
    pub failures: u64,
}

/// Handle to a running reconciler thread
#[derive(Debug)]
pub struct ProjectionReconciler {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<ReconcilerStats>>,
}

impl ProjectionReconciler {
    /// Start sweeping `model` until `deadline`
    ///
    /// The reconciler owns its RNG and its connection; nothing else is
    /// shared with the workers.
    pub fn spawn(
        model: Arc<dyn ReadModel>,
        config: ProjectionConfig,
        link: LinkConfig,
        seed: u64,
        deadline: Instant,
    ) -> TallyResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("tally-reconciler".to_string())
            .spawn(move || {
                let mut sweeper = Sweeper {
                    model,
                    config,
                    link: Link::new(link, seed ^ 0x7265_636f_6e63),
                    rng: StdRng::seed_from_u64(seed),
                    stop: stop_flag,
                    deadline,
                    stats: ReconcilerStats::default(),
                };
                sweeper.run();
                sweeper.stats
            })
            .map_err(|e| TallyError::internal(format!("failed to spawn reconciler: {}", e)))?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Wait for the thread to reach its deadline and return its stats
    pub fn join(mut self) -> ReconcilerStats {
        self.wait()
    }

    /// Stop early and return the stats
    pub fn stop(mut self) -> ReconcilerStats {
        self.stop.store(true, Ordering::Release);
        self.wait()
    }

    fn wait(&mut self) -> ReconcilerStats {
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                error!(target: "tally::reconciler", "reconciler thread panicked");
                ReconcilerStats::default()
            }
            None => ReconcilerStats::default(),
        }
    }
}

impl Drop for ProjectionReconciler {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop.store(true, Ordering::Release);
            self.wait();
        }
    }
}

struct Sweeper {
    model: Arc<dyn ReadModel>,
    config: ProjectionConfig,
    link: Link,
    rng: StdRng,
    stop: Arc<AtomicBool>,
    deadline: Instant,
    stats: ReconcilerStats,
}

impl Sweeper {
    fn halted(&self) -> bool {
        self.stop.load(Ordering::Acquire) || Instant::now() >= self.deadline
    }

    fn run(&mut self) {
        info!(target: "tally::reconciler", "reconciler started");
        while !self.halted() {
            self.stats.sweeps += 1;
            if let Err(e) = self.sweep() {
                self.stats.failures += 1;
                error!(target: "tally::reconciler", error = %e, "sweep failed");
            }
            self.pause(Duration::from_millis(self.config.sweep_interval_ms));
        }
        info!(
            target: "tally::reconciler",
            sweeps = self.stats.sweeps,
            records = self.stats.records_written,
            "reconciler stopped"
        );
    }

    fn sweep(&mut self) -> TallyResult<()> {
        let orders = self.model.scan_orders(&mut self.link)?;
        debug!(target: "tally::reconciler", orders = orders.len(), "sweep");
        for order in orders {
            if self.halted() {
                break;
            }
            if self.config.max_lag_ms > 0 && self.rng.gen::<f64>() < self.config.lag_probability {
                let lag_us = self.rng.gen_range(0..self.config.max_lag_ms * 1000);
                self.pause(Duration::from_micros(lag_us));
            }
            let record = ProjectionRecord {
                order_id: order.id,
                status: order.status,
                total: order.total,
                last_update: Utc::now(),
            };
            match self.model.upsert_projection(&mut self.link, record) {
                Ok(()) => self.stats.records_written += 1,
                Err(e) => {
                    self.stats.failures += 1;
                    error!(target: "tally::reconciler", order = %order.id, error = %e, "upsert failed");
                }
            }
        }
        Ok(())
    }

    /// Sleep, but never past the deadline
    fn pause(&self, wanted: Duration) {
        let left = self.deadline.saturating_duration_since(Instant::now());
        std::thread::sleep(wanted.min(left));
    }
}
