//! Conflict retry policy
//!
//! Contains RetryConfig and the retry loop the optimistic adapter wraps around
//! each serializable transaction.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tally_core::TallyResult;
use tracing::debug;

/// Configuration for transaction retry behavior
///
/// # Example
/// ```ignore
/// let config = RetryConfig::new().with_max_retries(5).with_base_delay_ms(1);
/// let attempt = retry_on_conflict(&config, || store.transaction(link, body));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first (0 = no retries)
    pub max_retries: usize,
    /// Base delay between retries in milliseconds (exponential backoff)
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1,
            max_delay_ms: 50,
        }
    }
}

impl RetryConfig {
    /// Create a new RetryConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a RetryConfig with no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Set maximum number of retries
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set base delay for exponential backoff
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set maximum delay between retries
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Delay before retry number `attempt` (0-based)
    pub(crate) fn calculate_delay(&self, attempt: usize) -> Duration {
        // Cap the shift to prevent overflow
        let shift = attempt.min(63);
        let multiplier = 1u64 << shift;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// Outcome of a retried transaction
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// Final result: the body's value, the last conflict, or a non-retriable error
    pub result: TallyResult<T>,
    /// Conflicts seen (one abort per conflict, including a final exhausted one)
    pub aborts: u32,
}

impl<T> RetryOutcome<T> {
    /// Whether the retry budget ran out on a conflict
    pub fn gave_up(&self) -> bool {
        matches!(&self.result, Err(e) if e.is_conflict())
    }
}

/// Run `attempt` until it succeeds, fails with a non-conflict error, or the
/// retry budget is exhausted
///
/// `max_retries + 1` attempts at most. Non-retriable errors return at once.
pub fn retry_on_conflict<T, F>(config: &RetryConfig, mut attempt: F) -> RetryOutcome<T>
where
    F: FnMut() -> TallyResult<T>,
{
    let mut aborts = 0u32;
    let mut try_no = 0usize;
    loop {
        match attempt() {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    aborts,
                }
            }
            Err(e) if e.is_retriable() => {
                aborts += 1;
                if try_no >= config.max_retries {
                    debug!(target: "tally::txn", aborts, "retry budget exhausted");
                    return RetryOutcome {
                        result: Err(e),
                        aborts,
                    };
                }
                let delay = config.calculate_delay(try_no);
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                try_no += 1;
            }
            Err(e) => return RetryOutcome { result: Err(e), aborts },
        }
    }
}
