//! PayRail Ledger Core
//!
//! Double-entry ledger with an ordered event log and in-transaction read
//! models.
//!
//! # Architecture
//!
//! - **Single Writer**: all tables behind one commit lock; a unit of work
//!   stages writes and commits all-or-nothing
//! - **Double-Entry**: every transaction is exactly two immutable entries
//!   that balance to zero
//! - **Synchronous Events**: events commit in the same atomic unit as the
//!   state they describe; no outbox, no eventual consistency
//! - **Derived Read Models**: balances and summaries update in-transaction
//!   and rebuild byte-equal from source tables
//!
//! # Invariants
//!
//! - Balance to zero: Σ(debits) == Σ(credits) per transaction, two entries
//! - Entries, events, and transactions never change after commit
//! - Event sequence numbers form the dense set {1..N}
//! - Read models equal their recomputation from source truth

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod accounts;
pub mod error;
pub mod events;
pub mod ledger;
pub mod metrics;
pub mod projector;
pub mod store;
pub mod types;

// Re-exports
pub use error::{Error, Result};
pub use ledger::{Ledger, NewTransaction, Posting};
pub use store::{Store, UnitOfWork};
pub use types::{
    Account, AccountBalance, AccountId, AccountType, AggregateType, Amount, Currency, EventKind,
    EventRecord, LedgerEntry, LedgerTransaction, Payout, PayoutStatus, Side, TransactionId,
};
