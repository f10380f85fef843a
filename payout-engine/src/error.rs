//! Error types for the payout engine

use ledger_core::PayoutStatus;
use thiserror::Error;
use uuid::Uuid;

/// Result type for payout operations
pub type Result<T> = std::result::Result<T, Error>;

/// Payout engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed intake request (reported to the caller as a 4xx)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Same idempotency key, different payload (409 to the caller)
    #[error("Idempotency conflict on key: {0}")]
    IdempotencyConflict(String),

    /// The transition table forbids this move
    #[error("Illegal transition: {from} -> {to}")]
    IllegalTransition {
        /// Current state
        from: PayoutStatus,
        /// Attempted state
        to: PayoutStatus,
    },

    /// Completed payout re-finalized with a different external id
    #[error("External payout id conflict: {0}")]
    ExternalIdConflict(String),

    /// Payout not found
    #[error("Payout not found: {0}")]
    PayoutNotFound(Uuid),

    /// External call failed but may succeed when retried
    #[error("Transient provider failure: {0}")]
    ProviderTransient(String),

    /// External call will not succeed
    #[error("Permanent provider failure: {0}")]
    ProviderPermanent(String),

    /// Work queue unavailable
    #[error("Queue error: {0}")]
    Queue(String),

    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for failures the dispatcher should redeliver with backoff
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ProviderTransient(_) | Error::Queue(_) => true,
            Error::Ledger(ledger_core::Error::Storage(_)) => true,
            _ => false,
        }
    }
}
