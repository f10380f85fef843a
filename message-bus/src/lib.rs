//! PayRail Message Bus
//!
//! Best-effort fan-out of committed events to real-time observers. The bus
//! is explicitly non-authoritative: the relational event log is the system
//! of record, and subscribers that miss or lag reconcile by reading the log
//! from their last seen sequence number.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod publisher;
pub mod types;

// Re-exports
pub use publisher::{BroadcastBus, NoopPublisher, Publisher};
pub use types::{Message, Topic};
