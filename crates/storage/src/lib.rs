//! Storage layer for tally
//!
//! This crate implements the in-process backend models with:
//! - Keyspace: DashMap-sharded versioned rows with a reachability switch
//! - Link: per-connection simulated round trips and connection failures
//! - WideColumnStore: last-writer-wins statements, no compare-and-set
//! - DocumentStore: single-document atomic find-and-update
//!
//! The serializable model lives in `tally-concurrency` and builds on the
//! same `Keyspace`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod keyspace;
pub mod link;
pub mod statements;
pub mod wide_column;

pub use document::DocumentStore;
pub use keyspace::{Keyspace, VersionedRow};
pub use link::{Link, LinkConfig};
pub use statements::OrderStatements;
pub use wide_column::WideColumnStore;
