//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `payouts_created_total` - Payouts accepted at intake
//! - `payouts_completed_total` - Payouts settled and posted
//! - `payouts_failed_total` - Payouts terminally failed
//! - `payouts_retried_total` - Retry events scheduled
//! - `provider_calls_total{outcome}` - External calls by outcome
//! - `provider_call_duration_seconds` - External call latency

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Payouts accepted at intake
    pub payouts_created: IntCounter,

    /// Payouts settled and posted
    pub payouts_completed: IntCounter,

    /// Payouts terminally failed
    pub payouts_failed: IntCounter,

    /// Retry events scheduled
    pub payouts_retried: IntCounter,

    /// External calls by outcome (`success`, `transient`, `permanent`)
    pub provider_calls: IntCounterVec,

    /// External call latency
    pub provider_call_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create a collector with its own registry
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let payouts_created = IntCounter::with_opts(Opts::new(
            "payouts_created_total",
            "Payouts accepted at intake",
        ))
        .expect("valid metric opts");
        let payouts_completed = IntCounter::with_opts(Opts::new(
            "payouts_completed_total",
            "Payouts settled and posted",
        ))
        .expect("valid metric opts");
        let payouts_failed = IntCounter::with_opts(Opts::new(
            "payouts_failed_total",
            "Payouts terminally failed",
        ))
        .expect("valid metric opts");
        let payouts_retried = IntCounter::with_opts(Opts::new(
            "payouts_retried_total",
            "Retry events scheduled",
        ))
        .expect("valid metric opts");
        let provider_calls = IntCounterVec::new(
            Opts::new("provider_calls_total", "External calls by outcome"),
            &["outcome"],
        )
        .expect("valid metric opts");
        let provider_call_duration = Histogram::with_opts(
            HistogramOpts::new(
                "provider_call_duration_seconds",
                "External call latency",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )
        .expect("valid metric opts");

        registry
            .register(Box::new(payouts_created.clone()))
            .expect("fresh registry accepts collectors");
        registry
            .register(Box::new(payouts_completed.clone()))
            .expect("fresh registry accepts collectors");
        registry
            .register(Box::new(payouts_failed.clone()))
            .expect("fresh registry accepts collectors");
        registry
            .register(Box::new(payouts_retried.clone()))
            .expect("fresh registry accepts collectors");
        registry
            .register(Box::new(provider_calls.clone()))
            .expect("fresh registry accepts collectors");
        registry
            .register(Box::new(provider_call_duration.clone()))
            .expect("fresh registry accepts collectors");

        Self {
            payouts_created,
            payouts_completed,
            payouts_failed,
            payouts_retried,
            provider_calls,
            provider_call_duration,
            registry,
        }
    }

    /// Registry for scraping
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.payouts_created.get(), 0);
        metrics.payouts_created.inc();
        assert_eq!(metrics.payouts_created.get(), 1);
    }

    #[test]
    fn test_provider_outcome_labels() {
        let metrics = Metrics::new();
        metrics.provider_calls.with_label_values(&["success"]).inc();
        metrics
            .provider_calls
            .with_label_values(&["transient"])
            .inc();
        assert_eq!(
            metrics.provider_calls.with_label_values(&["success"]).get(),
            1
        );
    }
}
