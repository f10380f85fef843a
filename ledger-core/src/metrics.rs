//! Metrics collection for observability
//!
//! Prometheus collectors on an owned registry, one instance per store.
//!
//! # Metrics
//!
//! - `ledger_events_appended_total` - Events committed to the log
//! - `ledger_transactions_posted_total` - Balanced transactions posted
//! - `ledger_read_model_rebuilds_total` - Full read-model rebuilds

use prometheus::{IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Events committed to the log
    pub events_appended: IntCounter,

    /// Balanced transactions posted
    pub transactions_posted: IntCounter,

    /// Full read-model rebuilds
    pub rebuilds: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create a collector with its own registry
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let events_appended = IntCounter::with_opts(Opts::new(
            "ledger_events_appended_total",
            "Events committed to the log",
        ))
        .expect("valid metric opts");
        let transactions_posted = IntCounter::with_opts(Opts::new(
            "ledger_transactions_posted_total",
            "Balanced transactions posted",
        ))
        .expect("valid metric opts");
        let rebuilds = IntCounter::with_opts(Opts::new(
            "ledger_read_model_rebuilds_total",
            "Full read-model rebuilds",
        ))
        .expect("valid metric opts");

        for collector in [&events_appended, &transactions_posted, &rebuilds] {
            registry
                .register(Box::new(collector.clone()))
                .expect("fresh registry accepts collectors");
        }

        Self {
            events_appended,
            transactions_posted,
            rebuilds,
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
