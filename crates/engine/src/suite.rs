//! Benchmark entry points
//!
//! A benchmark is: validate the config, set the backend up, start the
//! reconciler if the scenario and backend call for one, run the workers to
//! the deadline, stop the reconciler, audit, and assemble the KPI record.
//! Only a failed setup aborts a benchmark; it does so before any worker
//! starts.

use crate::adapter::{AuditState, BackendAdapter, BackendKind};
use crate::config::WorkloadConfig;
use crate::reconciler::{ProjectionReconciler, ReconcilerStats};
use crate::report::KpiReport;
use crate::runner::{RunOutput, WorkloadRunner};
use crate::verifier::{CorrectnessReport, CorrectnessVerifier};
use std::sync::Arc;
use std::time::Instant;
use tally_core::TallyResult;
use tracing::{error, info};

/// Seed offset of the reconciler RNG, away from every worker's seed
const RECONCILER_SEED_OFFSET: u64 = 0x9e37_79b9_7f4a_7c15;

/// Everything one benchmark produced
#[derive(Debug, Clone)]
pub struct BenchmarkRun {
    /// Flat KPI record
    pub report: KpiReport,
    /// Raw worker output
    pub output: RunOutput,
    /// Audit detail
    pub correctness: CorrectnessReport,
    /// Final backend rows
    pub state: AuditState,
    /// Reconciler activity, when one ran
    pub reconciler: Option<ReconcilerStats>,
}

/// Run one benchmark against an adapter
pub fn run_adapter(
    config: &WorkloadConfig,
    adapter: Arc<dyn BackendAdapter>,
) -> TallyResult<BenchmarkRun> {
    config.validate()?;
    // Pin the seed so workers, reconciler and report agree on it
    let seed = config.base_seed();
    let config = Arc::new(config.clone().with_seed(seed));

    info!(
        target: "tally::runner",
        backend = adapter.name(),
        scenario = %config.scenario,
        seed,
        "setting up backend"
    );
    adapter.setup(&config)?;

    let runner = WorkloadRunner::new(Arc::clone(&config), Arc::clone(&adapter));
    let deadline = Instant::now() + config.duration();

    let reconciler = match adapter.read_model() {
        Some(model) if config.scenario.uses_projection() => Some(ProjectionReconciler::spawn(
            model,
            config.projection.clone(),
            config.link.clone(),
            seed.wrapping_add(RECONCILER_SEED_OFFSET),
            deadline,
        )?),
        _ => None,
    };

    let output = runner.run_until(deadline);
    let reconciler = reconciler.map(ProjectionReconciler::join);
    let output = output?;

    let state = adapter.audit()?;
    let correctness = CorrectnessVerifier::verify(&state, &output.counters);
    let report = KpiReport::assemble(
        &config,
        adapter.name(),
        adapter.strategy(),
        &output,
        &correctness,
    );
    Ok(BenchmarkRun {
        report,
        output,
        correctness,
        state,
        reconciler,
    })
}

/// Run one benchmark against a fresh backend of `kind`
pub fn run_benchmark(config: &WorkloadConfig, kind: BackendKind) -> TallyResult<KpiReport> {
    Ok(run_adapter(config, kind.build())?.report)
}

/// Run the same config against each backend in turn
///
/// A backend that fails is reported as an error for that backend only.
pub fn run_suite(
    config: &WorkloadConfig,
    kinds: &[BackendKind],
) -> Vec<(BackendKind, TallyResult<KpiReport>)> {
    kinds
        .iter()
        .map(|&kind| {
            let result = run_benchmark(config, kind);
            if let Err(e) = &result {
                error!(target: "tally::runner", backend = kind.name(), error = %e, "benchmark failed");
            }
            (kind, result)
        })
        .collect()
}
