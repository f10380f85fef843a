//! PayRail Payout Engine
//!
//! Exactly-once payout processing over the double-entry ledger.
//!
//! # Architecture
//!
//! - **Idempotent intake**: one payout per idempotency key, conflicts
//!   rejected without mutation
//! - **State machine**: `Pending -> Processing -> Completed | Failed`, with
//!   `Cancelled` from `Pending`; every transition commits its event and
//!   read-model rows in the same atomic unit
//! - **Ledger timing**: entries are posted only when a payout completes, so
//!   a crashed worker leaves no provisional money movement
//! - **At-least-once workers**: duplicate deliveries converge because every
//!   operation is idempotent on the payout row

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod retry;
pub mod types;
pub mod worker;

// Re-exports
pub use config::Config;
pub use engine::{IntakeOutcome, PayoutEngine};
pub use error::{Error, Result};
pub use provider::{MockPayoutProvider, PayoutProvider, ProviderError, ProviderReceipt,
    ProviderRequest};
pub use types::PayoutRequest;
pub use worker::{Dispatcher, PayoutService};
