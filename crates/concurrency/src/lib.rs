//! Concurrency layer for tally
//!
//! This crate implements the serializable backend model with optimistic
//! concurrency control (OCC):
//! - Transaction: read-set tracking and buffered writes
//! - validation: first-committer-wins on the read set
//! - SerializableStore: atomic validate-and-apply under one commit lock
//!
//! Conflicts are reported as `TallyError::Conflict`; retrying is the
//! caller's job.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;
pub mod validation;

pub use manager::{SerializableStore, TransactionStats};
pub use transaction::{Transaction, TransactionStatus};
pub use validation::{validate_read_set, ReadConflict, ValidationResult};
