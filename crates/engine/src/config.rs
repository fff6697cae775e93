//! Workload configuration via TOML
//!
//! One `WorkloadConfig` describes a run: how many workers, for how long,
//! which scenario, and the knobs of the simulated backends. It is shared
//! read-only (`Arc`) for the whole run.

use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tally_core::{TallyError, TallyResult};
use tally_storage::LinkConfig;

/// Which order workload the workers run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Every worker buys one unit of a single hot SKU
    ConcurrentOrders,
    /// Multi-line carts over many SKUs with injected late failures
    Rollback,
}

impl Scenario {
    /// Name used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::ConcurrentOrders => "concurrent_orders",
            Scenario::Rollback => "rollback",
        }
    }

    /// Whether weak backends run a projection reconciler in this scenario
    pub fn uses_projection(&self) -> bool {
        matches!(self, Scenario::Rollback)
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing of the projection reconciler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Pause between sweeps
    pub sweep_interval_ms: u64,
    /// Probability that one record is delayed before being copied
    pub lag_probability: f64,
    /// Upper bound of that delay
    pub max_lag_ms: u64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 50,
            lag_probability: 0.5,
            max_lag_ms: 10,
        }
    }
}

/// Configuration of one benchmark run
///
/// # Example
///
/// ```toml
/// workers = 32
/// duration_ms = 10000
/// scenario = "concurrent_orders"
/// initial_stock = 100
///
/// [link]
/// round_trip_us = 200
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Concurrent worker threads
    pub workers: usize,
    /// Wall-clock run length
    pub duration_ms: u64,
    /// Workload to run
    pub scenario: Scenario,
    /// Units seeded per SKU
    pub initial_stock: i64,
    /// Number of SKUs in the rollback scenario
    pub hot_skus: usize,
    /// Probability of a late failure after payment capture (rollback only)
    pub late_failure_probability: f64,
    /// Base seed for every RNG; random when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Maximum connections in flight at once
    pub pool_cap: usize,
    /// Conflict retry policy of the optimistic adapter
    pub retry: RetryConfig,
    /// Reconciler timing
    pub projection: ProjectionConfig,
    /// Simulated network of the backend
    pub link: LinkConfig,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            workers: 32,
            duration_ms: 10_000,
            scenario: Scenario::ConcurrentOrders,
            initial_stock: 100,
            hot_skus: 50,
            late_failure_probability: 0.1,
            seed: None,
            pool_cap: 64,
            retry: RetryConfig::default(),
            projection: ProjectionConfig::default(),
            link: LinkConfig::default(),
        }
    }
}

fn check_probability(name: &str, p: f64) -> TallyResult<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(TallyError::invalid_config(format!(
            "{} must be within [0, 1], got {}",
            name, p
        )))
    }
}

impl WorkloadConfig {
    /// Run length as a `Duration`
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Reject configurations no run can honour
    pub fn validate(&self) -> TallyResult<()> {
        if self.workers == 0 {
            return Err(TallyError::invalid_config("workers must be at least 1"));
        }
        if self.duration_ms == 0 {
            return Err(TallyError::invalid_config("duration_ms must be at least 1"));
        }
        if self.initial_stock < 0 {
            return Err(TallyError::invalid_config("initial_stock must not be negative"));
        }
        if self.scenario == Scenario::Rollback && self.hot_skus == 0 {
            return Err(TallyError::invalid_config("hot_skus must be at least 1"));
        }
        if self.pool_cap == 0 {
            return Err(TallyError::invalid_config("pool_cap must be at least 1"));
        }
        check_probability("late_failure_probability", self.late_failure_probability)?;
        check_probability("projection.lag_probability", self.projection.lag_probability)?;
        check_probability("link.failure_rate", self.link.failure_rate)?;
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> TallyResult<Self> {
        let config: WorkloadConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: &Path) -> TallyResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TallyError::invalid_config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> TallyResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# tally workload configuration

# Concurrent worker threads
workers = 32

# Wall-clock run length in milliseconds
duration_ms = 10000

# "concurrent_orders" (one hot SKU) or "rollback" (carts + late failures)
scenario = "concurrent_orders"

# Units seeded per SKU
initial_stock = 100

# Number of SKUs in the rollback scenario (SKU-000, SKU-001, ...)
hot_skus = 50

# Probability of a late failure after payment capture (rollback only)
late_failure_probability = 0.1

# Maximum connections in flight at once, independent of workers
pool_cap = 64

# Base seed for every RNG; omit for a random seed
# seed = 7

[retry]
max_retries = 5
base_delay_ms = 1
max_delay_ms = 50

[projection]
sweep_interval_ms = 50
lag_probability = 0.5
max_lag_ms = 10

[link]
round_trip_us = 200
jitter_us = 100
failure_rate = 0.0
"#
    }

    /// Seed every RNG of this run derives from
    ///
    /// Fixed when `seed` is set; otherwise drawn once per call.
    pub fn base_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }

    /// Set the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the run length
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = saturating_millis(duration);
        self
    }

    /// Set the scenario
    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = scenario;
        self
    }

    /// Set the stock seeded per SKU
    pub fn with_initial_stock(mut self, initial_stock: i64) -> Self {
        self.initial_stock = initial_stock;
        self
    }

    /// Set the number of SKUs in the rollback scenario
    pub fn with_hot_skus(mut self, hot_skus: usize) -> Self {
        self.hot_skus = hot_skus;
        self
    }

    /// Set the late failure probability
    pub fn with_late_failure_probability(mut self, p: f64) -> Self {
        self.late_failure_probability = p;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Fix the base seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the connection pool cap
    pub fn with_pool_cap(mut self, pool_cap: usize) -> Self {
        self.pool_cap = pool_cap;
        self
    }

    /// Set the reconciler timing
    pub fn with_projection(mut self, projection: ProjectionConfig) -> Self {
        self.projection = projection;
        self
    }

    /// Set the simulated network
    pub fn with_link(mut self, link: LinkConfig) -> Self {
        self.link = link;
        self
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub(crate) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        WorkloadConfig::default().validate().unwrap();
    }

    #[test]
    fn default_toml_parses_to_default() {
        let config = WorkloadConfig::from_toml_str(WorkloadConfig::default_toml()).unwrap();
        assert_eq!(config, WorkloadConfig::default());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = WorkloadConfig::from_toml_str(
            "workers = 4\nscenario = \"rollback\"\n[link]\nround_trip_us = 0\n",
        )
        .unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.scenario, Scenario::Rollback);
        assert_eq!(config.link.round_trip_us, 0);
        assert_eq!(config.link.jitter_us, LinkConfig::default().jitter_us);
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn huge_duration_saturates() {
        let config = WorkloadConfig::default().with_duration(Duration::MAX);
        assert_eq!(config.duration_ms, u64::MAX);
        let config = WorkloadConfig::default().with_duration(Duration::from_millis(1_500));
        assert_eq!(config.duration_ms, 1_500);
        assert_eq!(saturating_millis(Duration::from_micros(999)), 0);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(WorkloadConfig::default().with_workers(0).validate().is_err());
        assert!(WorkloadConfig::default().with_pool_cap(0).validate().is_err());
        assert!(WorkloadConfig::default()
            .with_late_failure_probability(1.5)
            .validate()
            .is_err());
        assert!(WorkloadConfig::default()
            .with_scenario(Scenario::Rollback)
            .with_hot_skus(0)
            .validate()
            .is_err());
        assert!(WorkloadConfig::from_toml_str("duration_ms = 0").is_err());
    }

    #[test]
    fn unknown_scenario_is_a_serialization_error() {
        let err = WorkloadConfig::from_toml_str("scenario = \"iot\"").unwrap_err();
        assert!(matches!(err, TallyError::Serialization(_)));
    }

    #[test]
    fn round_trips_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tally.toml");
        let config = WorkloadConfig::default()
            .with_workers(8)
            .with_seed(7)
            .with_scenario(Scenario::Rollback);
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();
        assert_eq!(WorkloadConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(WorkloadConfig::from_file(&dir.path().join("nope.toml")).is_err());
    }

    #[test]
    fn seed_is_stable_when_fixed() {
        let config = WorkloadConfig::default().with_seed(42);
        assert_eq!(config.base_seed(), 42);
        assert_eq!(config.base_seed(), 42);
    }
}
