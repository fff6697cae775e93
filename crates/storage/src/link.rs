//! Simulated client connection
//!
//! Every statement a backend model executes is charged to the calling
//! connection's `Link`: the calling thread sleeps for one round trip and the
//! statement may fail like a dropped connection would. This is the only place
//! a worker suspends, which is what gives the weak models their interleavings.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tally_core::{TallyError, TallyResult};
use tracing::trace;

/// Network model for one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Fixed cost of one statement, in microseconds
    pub round_trip_us: u64,
    /// Extra uniform delay in `[0, jitter_us]` per statement
    pub jitter_us: u64,
    /// Probability that a statement fails with a connection error
    pub failure_rate: f64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            round_trip_us: 200,
            jitter_us: 100,
            failure_rate: 0.0,
        }
    }
}

impl LinkConfig {
    /// Zero-cost, never-failing link
    pub fn loopback() -> Self {
        Self {
            round_trip_us: 0,
            jitter_us: 0,
            failure_rate: 0.0,
        }
    }

    /// Set the round trip cost
    pub fn with_round_trip_us(mut self, round_trip_us: u64) -> Self {
        self.round_trip_us = round_trip_us;
        self
    }

    /// Set the jitter bound
    pub fn with_jitter_us(mut self, jitter_us: u64) -> Self {
        self.jitter_us = jitter_us;
        self
    }

    /// Set the per-statement failure probability
    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate;
        self
    }
}

/// One client connection's view of the network
///
/// Owned by exactly one worker; never shared.
#[derive(Debug)]
pub struct Link {
    config: LinkConfig,
    rng: StdRng,
    statements: u64,
    failures: u64,
}

impl Link {
    /// Create a link with its own seeded RNG
    pub fn new(config: LinkConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            statements: 0,
            failures: 0,
        }
    }

    /// Zero-cost link used for setup and the final audit
    pub fn loopback() -> Self {
        Self::new(LinkConfig::loopback(), 0)
    }

    /// Charge one statement: sleep one round trip, maybe fail
    pub fn exchange(&mut self) -> TallyResult<()> {
        self.statements += 1;

        let jitter = if self.config.jitter_us > 0 {
            self.rng.gen_range(0..=self.config.jitter_us)
        } else {
            0
        };
        let delay_us = self.config.round_trip_us + jitter;
        if delay_us > 0 {
            std::thread::sleep(Duration::from_micros(delay_us));
        }

        if self.config.failure_rate > 0.0 && self.rng.gen::<f64>() < self.config.failure_rate {
            self.failures += 1;
            trace!(target: "tally::storage", statements = self.statements, "injected connection reset");
            return Err(TallyError::connection("connection reset by peer"));
        }
        Ok(())
    }

    /// Statements charged so far
    pub fn statements(&self) -> u64 {
        self.statements
    }

    /// Statements that failed so far
    pub fn failures(&self) -> u64 {
        self.failures
    }
}
