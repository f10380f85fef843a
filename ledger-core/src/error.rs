//! Error types for the ledger

use crate::types::{Currency, PayoutStatus};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Entry amount is zero or negative
    #[error("Non-positive amount: {0}")]
    NonPositiveAmount(String),

    /// Debit and credit legs differ
    #[error("Unbalanced transaction: debit {debit} != credit {credit}")]
    Unbalanced {
        /// Debit leg
        debit: String,
        /// Credit leg
        credit: String,
    },

    /// Arithmetic across different currencies
    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Left operand currency
        left: Currency,
        /// Right operand currency
        right: Currency,
    },

    /// Amount string failed to parse or exceeds the fixed scale
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Referenced account does not exist
    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    /// Account code already taken
    #[error("Account already exists: {0}")]
    AccountExists(String),

    /// Transaction id already committed (idempotent retries are resolved
    /// before this surfaces; seeing it is a programmer bug)
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    /// Same transaction id re-posted with a different payload
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    /// Transaction not found
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Event not found
    #[error("Event not found: {0}")]
    EventNotFound(String),

    /// Payout row not found
    #[error("Payout not found: {0}")]
    PayoutNotFound(String),

    /// Attempted payout state change the transition table forbids
    #[error("Illegal transition: {from} -> {to}")]
    IllegalTransition {
        /// Current state
        from: PayoutStatus,
        /// Attempted state
        to: PayoutStatus,
    },

    /// Invariant violation (balance-to-zero, sequence density, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Storage engine error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
