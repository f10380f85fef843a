//! Configuration for the payout engine

use crate::retry::RetryConfig;
use ledger_core::accounts::ChartConfig;
use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Bootstrap accounts payouts settle against
    pub chart: ChartConfig,

    /// State machine limits
    pub payout: PayoutConfig,

    /// Dispatcher sizing
    pub worker: WorkerConfig,

    /// Redelivery backoff
    pub retry: RetryConfig,
}

/// State machine limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutConfig {
    /// Failed attempts after which a retryable failure becomes terminal
    pub max_retries: u32,

    /// Deadline per external provider call
    pub provider_deadline_ms: u64,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            provider_deadline_ms: 30_000,
        }
    }
}

/// Dispatcher sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Concurrent worker tasks
    pub concurrency: usize,

    /// Bound of the work queue; intake backpressures when full
    pub queue_depth: usize,

    /// Redeliveries of one item before the dispatcher gives up
    pub max_redeliveries: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            queue_depth: 1024,
            max_redeliveries: 10,
        }
    }
}

impl Config {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults overridden by environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(code) = std::env::var("PAYOUT_CASH_CODE") {
            config.chart.cash_code = code;
        }
        if let Ok(code) = std::env::var("PAYOUT_LIABILITY_CODE") {
            config.chart.payout_liability_code = code;
        }
        if let Ok(value) = std::env::var("PAYOUT_MAX_RETRIES") {
            config.payout.max_retries = value
                .parse()
                .map_err(|_| crate::Error::Config(format!("bad PAYOUT_MAX_RETRIES: {}", value)))?;
        }
        if let Ok(value) = std::env::var("PAYOUT_PROVIDER_DEADLINE_MS") {
            config.payout.provider_deadline_ms = value.parse().map_err(|_| {
                crate::Error::Config(format!("bad PAYOUT_PROVIDER_DEADLINE_MS: {}", value))
            })?;
        }
        if let Ok(value) = std::env::var("PAYOUT_WORKER_CONCURRENCY") {
            config.worker.concurrency = value.parse().map_err(|_| {
                crate::Error::Config(format!("bad PAYOUT_WORKER_CONCURRENCY: {}", value))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.worker.concurrency == 0 {
            return Err(crate::Error::Config(
                "worker.concurrency must be at least 1".to_string(),
            ));
        }
        if self.worker.queue_depth == 0 {
            return Err(crate::Error::Config(
                "worker.queue_depth must be at least 1".to_string(),
            ));
        }
        if self.payout.provider_deadline_ms == 0 {
            return Err(crate::Error::Config(
                "payout.provider_deadline_ms must be positive".to_string(),
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(crate::Error::Config(
                "retry.backoff_multiplier must be at least 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(crate::Error::Config(
                "retry.jitter_factor must be between 0 and 1".to_string(),
            ));
        }
        if self.chart.cash_code == self.chart.payout_liability_code {
            return Err(crate::Error::Config(
                "chart accounts must be distinct".to_string(),
            ));
        }
        Ok(())
    }
}
