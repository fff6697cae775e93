//! Read-set validation for OCC
//!
//! Rules:
//! - First committer wins, judged on the READ set only
//! - Blind writes (write without read) do not conflict
//! - A key read while absent was read at version 0; an insert by another
//!   transaction before commit is a conflict
//! - Write skew across disjoint keys is not prevented

use rustc_hash::FxHashMap;
use tally_core::{RowKey, TallyError};
use tally_storage::Keyspace;

/// A read whose version moved before commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadConflict {
    /// Key that was read
    pub key: RowKey,
    /// Version recorded when it was read
    pub read_version: u64,
    /// Version found at validation time
    pub current_version: u64,
}

impl From<ReadConflict> for TallyError {
    fn from(c: ReadConflict) -> Self {
        TallyError::Conflict {
            key: c.key,
            read_version: c.read_version,
            current_version: c.current_version,
        }
    }
}

/// Result of transaction validation
///
/// A transaction commits only if `is_valid()`.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// All conflicts detected
    pub conflicts: Vec<ReadConflict>,
}

impl ValidationResult {
    /// No conflicts
    pub fn ok() -> Self {
        Self::default()
    }

    /// Whether validation passed
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Number of conflicts found
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// First conflict as an error, `Ok` if valid
    pub fn into_result(self) -> Result<(), TallyError> {
        match self.conflicts.into_iter().next() {
            Some(conflict) => Err(conflict.into()),
            None => Ok(()),
        }
    }
}

/// Compare every read version against the keyspace
///
/// Must run under the store's commit lock so no commit lands between
/// validation and apply.
pub fn validate_read_set(read_set: &FxHashMap<RowKey, u64>, keyspace: &Keyspace) -> ValidationResult {
    let mut result = ValidationResult::ok();
    for (key, &read_version) in read_set {
        let current_version = keyspace.version_of(key);
        if current_version != read_version {
            result.conflicts.push(ReadConflict {
                key: key.clone(),
                read_version,
                current_version,
            });
        }
    }
    result
}
