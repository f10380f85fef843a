//! External payout provider contract
//!
//! The provider is an outbound RPC that MUST deduplicate by idempotency key:
//! retrying a request whose key already succeeded returns the original
//! external id instead of paying twice. Failures are classified as transient
//! (retry with backoff) or permanent (fail the payout).

use crate::error::Error;
use async_trait::async_trait;
use dashmap::DashMap;
use ledger_core::Amount;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error as ThisError;
use uuid::Uuid;

/// Outbound payout request
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Dedup key, forwarded verbatim from the payout
    pub idempotency_key: String,

    /// Amount to transfer
    pub amount: Amount,

    /// Recipient account at the provider
    pub recipient_account: String,

    /// Recipient display name
    pub recipient_name: String,
}

/// Successful provider response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReceipt {
    /// Provider-side payout id
    pub external_id: String,
}

/// Provider failure classification
#[derive(Debug, Clone, ThisError)]
pub enum ProviderError {
    /// Worth retrying with backoff
    #[error("transient: {0}")]
    Transient(String),

    /// Will not succeed; fail the payout
    #[error("permanent: {0}")]
    Permanent(String),
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Transient(msg) => Error::ProviderTransient(msg),
            ProviderError::Permanent(msg) => Error::ProviderPermanent(msg),
        }
    }
}

/// External payout rail
#[async_trait]
pub trait PayoutProvider: Send + Sync {
    /// Execute (or deduplicate) one payout
    async fn send_payout(
        &self,
        request: &ProviderRequest,
    ) -> std::result::Result<ProviderReceipt, ProviderError>;
}

/// In-process provider stand-in.
///
/// Deduplicates by idempotency key like a production rail and supports
/// scripted failure injection, which is how the crash and retry scenarios
/// are exercised in tests.
#[derive(Default)]
pub struct MockPayoutProvider {
    receipts: DashMap<String, ProviderReceipt>,
    script: Mutex<VecDeque<ProviderError>>,
    calls: AtomicU64,
}

impl MockPayoutProvider {
    /// Create a provider that succeeds on every call
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure for an upcoming call. Failures are consumed in order
    /// before any new receipt is issued.
    pub fn fail_next(&self, error: ProviderError) {
        self.script.lock().push_back(error);
    }

    /// Total calls observed, including deduplicated ones
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Distinct successful payouts executed (dedup hits do not count)
    pub fn receipt_count(&self) -> usize {
        self.receipts.len()
    }
}

#[async_trait]
impl PayoutProvider for MockPayoutProvider {
    async fn send_payout(
        &self,
        request: &ProviderRequest,
    ) -> std::result::Result<ProviderReceipt, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        // Dedup wins over everything else: a key that already succeeded
        // keeps returning the original receipt
        if let Some(receipt) = self.receipts.get(&request.idempotency_key) {
            return Ok(receipt.clone());
        }

        if let Some(error) = self.script.lock().pop_front() {
            return Err(error);
        }

        let receipt = ProviderReceipt {
            external_id: format!("ext_{}", Uuid::new_v4().simple()),
        };
        self.receipts
            .insert(request.idempotency_key.clone(), receipt.clone());
        Ok(receipt)
    }
}
