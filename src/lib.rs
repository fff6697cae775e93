//! Tally - concurrency benchmark engine for order workloads
//!
//! Tally runs the same order workload against three consistency models and
//! measures what each one costs and what it breaks: oversold inventory,
//! orphaned payments and stale projection reads, next to throughput and
//! latency.
//!
//! # Quick Start
//!
//! ```ignore
//! use tally::{run_suite, BackendKind, WorkloadConfig};
//!
//! let config = WorkloadConfig::from_file("workload.toml".as_ref())?;
//! for (kind, report) in run_suite(&config, &BackendKind::ALL) {
//!     println!("{}: {}", kind, report?.to_json()?);
//! }
//! ```
//!
//! # Architecture
//!
//! - `tally-core`: rows, keys, errors
//! - `tally-storage`: keyspace, simulated links, wide-column and document stores
//! - `tally-concurrency`: the serializable store (OCC, first committer wins)
//! - `tally-engine`: adapters, runner, reconciler, verifier, KPI report
//!
//! Only the engine API is re-exported here.

pub use tally_core::{TallyError, TallyResult};
pub use tally_engine::*;
pub use tally_storage::LinkConfig;
