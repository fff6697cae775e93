//! Error types for tally
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! The engine only lets two kinds of error escape a run: configuration errors
//! and setup failures. Everything raised inside a worker's operation is mapped
//! to an outcome by the adapter.

use crate::types::RowKey;
use std::io;
use thiserror::Error;

/// Result type alias for tally operations
pub type TallyResult<T> = std::result::Result<T, TallyError>;

/// Error types for the benchmark engine and its backend models
#[derive(Debug, Error)]
pub enum TallyError {
    /// The backend cannot be reached at all
    #[error("Backend unreachable: {backend}")]
    Unreachable {
        /// Backend name
        backend: String,
    },

    /// A single statement failed on the wire (connection reset, timeout)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Serialization conflict detected at commit (first committer wins)
    #[error("Serialization conflict on {key}: read version {read_version}, current version {current_version}")]
    Conflict {
        /// Row whose version changed under the transaction
        key: RowKey,
        /// Version recorded in the read set
        read_version: u64,
        /// Version found at validation time
        current_version: u64,
    },

    /// Invalid workload or backend configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Row expected by the operation does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O error (config files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invariant broken inside the engine itself
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TallyError {
    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        TallyError::Internal(msg.into())
    }

    /// Create an invalid-configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        TallyError::InvalidConfig(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        TallyError::Connection(msg.into())
    }

    /// True for serialization conflicts
    pub fn is_conflict(&self) -> bool {
        matches!(self, TallyError::Conflict { .. })
    }

    /// True if retrying the same transaction can succeed
    ///
    /// Only conflicts qualify. Connection failures are counted as failed
    /// operations, never retried by the engine.
    pub fn is_retriable(&self) -> bool {
        self.is_conflict()
    }
}

impl From<toml::de::Error> for TallyError {
    fn from(e: toml::de::Error) -> Self {
        TallyError::Serialization(e.to_string())
    }
}

impl From<toml::ser::Error> for TallyError {
    fn from(e: toml::ser::Error) -> Self {
        TallyError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for TallyError {
    fn from(e: serde_json::Error) -> Self {
        TallyError::Serialization(e.to_string())
    }
}
