//! Backend adapters
//!
//! One adapter per backend/strategy pair. An adapter owns its backend's state:
//! `setup` seeds it, `operate` runs exactly one logical order transaction,
//! `audit` reads the final rows for the verifier.
//!
//! `operate` never returns an error and never panics across the runner
//! boundary: every backend error becomes an [`Outcome`](crate::Outcome).

mod atomic;
pub mod cart;
mod naive;
mod optimistic;

pub use atomic::AtomicAdapter;
pub use naive::NaiveAdapter;
pub use optimistic::OptimisticAdapter;

use crate::config::WorkloadConfig;
use crate::counters::OperationReport;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tally_core::{InventoryItem, Order, OrderId, Payment, ProjectionRecord, TallyResult};
use tally_storage::{Keyspace, Link, OrderStatements};

/// Concurrency-control strategy an adapter applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Serializable transaction, retried on conflict
    OptimisticRetry,
    /// Client-side read, compute, unconditional write
    NaiveReadModifyWrite,
    /// Single-document conditional update
    AtomicConditionalUpdate,
}

impl Strategy {
    /// Name used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::OptimisticRetry => "optimistic_retry",
            Strategy::NaiveReadModifyWrite => "naive_read_modify_write",
            Strategy::AtomicConditionalUpdate => "atomic_conditional_update",
        }
    }
}

/// Backend selected at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Relational store with serializable transactions
    Serializable,
    /// Wide-column store, last writer wins
    WideColumn,
    /// Document store with atomic single-document updates
    Document,
}

impl BackendKind {
    /// Every backend, in report order
    pub const ALL: [BackendKind; 3] = [
        BackendKind::Serializable,
        BackendKind::WideColumn,
        BackendKind::Document,
    ];

    /// Name used in reports and logs
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Serializable => "serializable",
            BackendKind::WideColumn => "wide_column",
            BackendKind::Document => "document",
        }
    }

    /// Strategy of this backend's adapter
    pub fn strategy(&self) -> Strategy {
        match self {
            BackendKind::Serializable => Strategy::OptimisticRetry,
            BackendKind::WideColumn => Strategy::NaiveReadModifyWrite,
            BackendKind::Document => Strategy::AtomicConditionalUpdate,
        }
    }

    /// Fresh adapter over an empty backend
    pub fn build(&self) -> Arc<dyn BackendAdapter> {
        match self {
            BackendKind::Serializable => Arc::new(OptimisticAdapter::new()),
            BackendKind::WideColumn => Arc::new(NaiveAdapter::new()),
            BackendKind::Document => Arc::new(AtomicAdapter::new()),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Worker-local state handed to every `operate()` call
///
/// Owned by one worker thread; nothing in it is shared.
#[derive(Debug)]
pub struct WorkerContext {
    /// Index of the worker
    pub worker_id: usize,
    /// Worker RNG (carts, order ids, late failures)
    pub rng: StdRng,
    /// Run configuration
    pub config: Arc<WorkloadConfig>,
    /// The worker's connection
    pub link: Link,
}

impl WorkerContext {
    /// Context for worker `worker_id` of a run seeded with `base_seed`
    pub fn new(worker_id: usize, config: Arc<WorkloadConfig>, base_seed: u64) -> Self {
        let seed = base_seed.wrapping_add(worker_id as u64);
        let link = Link::new(config.link.clone(), seed.rotate_left(32) ^ 0x5eed);
        Self {
            worker_id,
            rng: StdRng::seed_from_u64(seed),
            config,
            link,
        }
    }

    /// Fresh order id drawn from the worker RNG
    pub fn new_order_id(&mut self) -> OrderId {
        OrderId::from_random_bytes(self.rng.gen())
    }

    /// Roll for an injected late failure
    pub fn late_failure(&mut self) -> bool {
        let p = self.config.late_failure_probability;
        p > 0.0 && self.rng.gen::<f64>() < p
    }
}

/// Final backend rows read back for the verifier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditState {
    /// Inventory rows
    pub inventory: Vec<InventoryItem>,
    /// Order rows
    pub orders: Vec<Order>,
    /// Payment rows
    pub payments: Vec<Payment>,
}

/// Primary orders and their projection, as seen by the reconciler
pub trait ReadModel: Send + Sync {
    /// Read every primary order without isolation
    fn scan_orders(&self, link: &mut Link) -> TallyResult<Vec<Order>>;

    /// Write one projection record
    fn upsert_projection(&self, link: &mut Link, record: ProjectionRecord) -> TallyResult<()>;
}

impl<T: OrderStatements + Send + Sync> ReadModel for T {
    fn scan_orders(&self, link: &mut Link) -> TallyResult<Vec<Order>> {
        OrderStatements::scan_orders(self, link)
    }

    fn upsert_projection(&self, link: &mut Link, record: ProjectionRecord) -> TallyResult<()> {
        OrderStatements::upsert_projection(self, link, record)
    }
}

/// One backend/strategy pair
pub trait BackendAdapter: Send + Sync {
    /// Backend name
    fn name(&self) -> &'static str;

    /// Concurrency-control strategy
    fn strategy(&self) -> Strategy;

    /// Drop all state and seed inventory; idempotent
    ///
    /// Fails if the backend is unreachable.
    fn setup(&self, config: &WorkloadConfig) -> TallyResult<()>;

    /// Execute exactly one logical order transaction
    fn operate(&self, ctx: &mut WorkerContext) -> OperationReport;

    /// Asynchronous read model, if this backend keeps one
    fn read_model(&self) -> Option<Arc<dyn ReadModel>> {
        None
    }

    /// Read the final rows
    fn audit(&self) -> TallyResult<AuditState>;

    /// Keyspace backing this adapter
    fn keyspace(&self) -> Arc<Keyspace>;
}

/// Final rows of a per-statement backend over a zero-cost link
pub(crate) fn audit_statements<S: OrderStatements>(store: &S) -> TallyResult<AuditState> {
    let mut link = Link::loopback();
    Ok(AuditState {
        inventory: store.scan_inventory(&mut link)?,
        orders: store.scan_orders(&mut link)?,
        payments: store.scan_payments(&mut link)?,
    })
}
