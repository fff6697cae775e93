//! Benchmark engine for tally
//!
//! This crate drives the lower layers:
//! - adapter: one `BackendAdapter` per backend/strategy pair
//! - runner: worker threads, connection pool, outcome counters, latency
//! - reconciler: background projection sweeps for the weak backends
//! - verifier: post-run oversell and orphan-payment audit
//! - report/suite: KPI record and the entry points that tie it together
//!
//! The engine is the only component that knows about scenarios, deadlines
//! and KPIs; the stores below it only know rows and statements.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod config;
pub mod counters;
pub mod pool;
pub mod reconciler;
pub mod report;
pub mod retry;
pub mod runner;
pub mod stats;
pub mod suite;
pub mod verifier;

pub use adapter::{
    AtomicAdapter, AuditState, BackendAdapter, BackendKind, NaiveAdapter, OptimisticAdapter,
    ReadModel, Strategy, WorkerContext,
};
pub use config::{ProjectionConfig, Scenario, WorkloadConfig};
pub use counters::{CounterSnapshot, OperationReport, Outcome, OutcomeCounters};
pub use pool::{ConnectionPool, PooledConnection};
pub use reconciler::{ProjectionReconciler, ReconcilerStats};
pub use report::KpiReport;
pub use retry::{retry_on_conflict, RetryConfig, RetryOutcome};
pub use runner::{RunOutput, WorkloadRunner};
pub use stats::{percentile, LatencyStats, LatencySummary};
pub use suite::{run_adapter, run_benchmark, run_suite, BenchmarkRun};
pub use verifier::{CorrectnessReport, CorrectnessVerifier, KeyViolation, OversellKind};
