//! Exponential backoff with jitter for work redelivery

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Base delay before the first redelivery
    pub initial_delay_ms: u64,

    /// Upper bound on the computed delay
    pub max_delay_ms: u64,

    /// Growth factor per attempt
    pub backoff_multiplier: f64,

    /// Fraction of the delay randomized to spread redeliveries
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Backoff calculator
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create from configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Delay before redelivering an item that has failed `attempt + 1` times
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);

        let capped_delay = base_delay.min(self.config.max_delay_ms as f64);

        // Jitter spreads redeliveries to avoid a thundering herd
        let jitter_range = capped_delay * self.config.jitter_factor;
        let jitter = (rand::random::<f64>() - 0.5) * jitter_range * 2.0;
        let final_delay = (capped_delay + jitter).max(0.0);

        Duration::from_millis(final_delay as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(initial_ms: u64, max_ms: u64) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            initial_delay_ms: initial_ms,
            max_delay_ms: max_ms,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        })
    }

    #[test]
    fn test_exponential_backoff() {
        let policy = no_jitter(1000, 60_000);

        assert_eq!(policy.delay_for(0).as_millis(), 1000);
        assert_eq!(policy.delay_for(1).as_millis(), 2000);
        assert_eq!(policy.delay_for(2).as_millis(), 4000);
        assert_eq!(policy.delay_for(3).as_millis(), 8000);
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = no_jitter(1000, 5000);

        assert_eq!(policy.delay_for(10).as_millis(), 5000);
        assert_eq!(policy.delay_for(30).as_millis(), 5000);
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let policy = RetryPolicy::new(RetryConfig {
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        });

        for _ in 0..100 {
            let delay = policy.delay_for(0).as_millis() as f64;
            assert!((900.0..=1100.0).contains(&delay));
        }
    }
}
