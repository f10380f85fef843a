//! Core types for the ledger
//!
//! All types are designed for:
//! - Exact arithmetic (Decimal for money, never floats)
//! - Immutability after commit (no mutating accessors on persisted rows)
//! - Deterministic identifiers where retries must converge

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Fixed scale for money values (minor units, e.g. cents).
pub const AMOUNT_SCALE: u32 = 2;

/// ISO 4217 currency code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Currency {
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// British Pound
    GBP,
    /// UAE Dirham
    AED,
    /// Indian Rupee
    INR,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::AED => "AED",
            Currency::INR => "INR",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            "AED" => Some(Currency::AED),
            "INR" => Some(Currency::INR),
            _ => None,
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::USD
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Money value with an attached currency label.
///
/// The value is normalized to [`AMOUNT_SCALE`] on construction. Arithmetic is
/// closed under addition and negation and fails on currency mismatch instead
/// of silently mixing units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    value: Decimal,
    currency: Currency,
}

impl Amount {
    /// Create an amount, normalizing to the fixed scale
    pub fn new(value: Decimal, currency: Currency) -> Self {
        let mut value = value;
        value.rescale(AMOUNT_SCALE);
        Self { value, currency }
    }

    /// Create from minor units (e.g. cents)
    pub fn from_minor_units(minor: i64, currency: Currency) -> Self {
        Self {
            value: Decimal::new(minor, AMOUNT_SCALE),
            currency,
        }
    }

    /// Zero in the given currency
    pub fn zero(currency: Currency) -> Self {
        Self::from_minor_units(0, currency)
    }

    /// Parse from a decimal string (e.g. `"100.00"`)
    ///
    /// Rejects strings with more fractional digits than the fixed scale.
    pub fn parse(s: &str, currency: Currency) -> crate::Result<Self> {
        let value: Decimal = s
            .parse()
            .map_err(|e| crate::Error::InvalidAmount(format!("{}: {}", s, e)))?;
        if value.scale() > AMOUNT_SCALE {
            return Err(crate::Error::InvalidAmount(format!(
                "{} exceeds scale {}",
                s, AMOUNT_SCALE
            )));
        }
        Ok(Self::new(value, currency))
    }

    /// Decimal value
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Currency label
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// True if strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }

    /// True if negative
    pub fn is_negative(&self) -> bool {
        self.value < Decimal::ZERO
    }

    /// Add two amounts of the same currency
    pub fn checked_add(&self, other: &Amount) -> crate::Result<Amount> {
        self.require_same_currency(other)?;
        Ok(Amount::new(self.value + other.value, self.currency))
    }

    /// Subtract an amount of the same currency
    pub fn checked_sub(&self, other: &Amount) -> crate::Result<Amount> {
        self.require_same_currency(other)?;
        Ok(Amount::new(self.value - other.value, self.currency))
    }

    /// Negate
    pub fn neg(&self) -> Amount {
        Amount::new(-self.value, self.currency)
    }

    fn require_same_currency(&self, other: &Amount) -> crate::Result<()> {
        if self.currency != other.currency {
            return Err(crate::Error::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

/// Account identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Mint a new time-ordered id
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing id
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entry side of the double-entry books
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Debit
    Debit,
    /// Credit
    Credit,
}

impl Side {
    /// The opposing side
    pub fn opposite(&self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Debit => write!(f, "debit"),
            Side::Credit => write!(f, "credit"),
        }
    }
}

/// Accounting classification of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// Asset
    Asset,
    /// Liability
    Liability,
    /// Equity
    Equity,
    /// Revenue
    Revenue,
    /// Expense
    Expense,
}

impl AccountType {
    /// Side on which this account type increases
    pub fn normal_side(&self) -> Side {
        match self {
            AccountType::Asset | AccountType::Expense => Side::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => Side::Credit,
        }
    }
}

/// Account in the catalog. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Opaque identifier
    pub id: AccountId,

    /// Human code (e.g. `CASH_001`), unique
    pub code: String,

    /// Accounting classification
    pub account_type: AccountType,

    /// Side on which the balance increases
    pub normal_side: Side,

    /// Currency the account operates in; every posted entry must match
    pub currency: Currency,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Ledger transaction identifier, deterministic for payout-driven postings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wrap an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Deterministic id for the posting of a payout, `payout_<key>`
    pub fn for_payout(idempotency_key: &str) -> Self {
        Self(format!("payout_{}", idempotency_key))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction header. Exists only together with its two entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Identifier
    pub id: TransactionId,

    /// Free-form description
    pub description: String,

    /// Event-log position this transaction committed at. Read-model rebuilds
    /// use it to reproduce `as_of_sequence` exactly.
    pub posted_sequence: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Single immutable ledger entry. No update or delete operation exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry identifier
    pub id: Uuid,

    /// Owning transaction
    pub transaction_id: TransactionId,

    /// Posted account
    pub account_id: AccountId,

    /// Debit or credit
    pub side: Side,

    /// Non-negative amount
    pub amount: Amount,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Aggregate kind an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateType {
    /// A payout record
    Payout,
    /// A ledger transaction
    LedgerTransaction,
}

impl AggregateType {
    /// Stable string tag, also the fan-out topic name
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateType::Payout => "payout",
            AggregateType::LedgerTransaction => "ledger_transaction",
        }
    }
}

/// Event type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Payout accepted and recorded
    PayoutCreated,
    /// Payout claimed by a worker
    PayoutProcessingStarted,
    /// Payout settled and posted to the ledger
    PayoutCompleted,
    /// Transient failure, another attempt scheduled
    PayoutRetryScheduled,
    /// Payout failed terminally
    PayoutFailed,
    /// Payout cancelled before processing
    PayoutCancelled,
}

impl EventKind {
    /// Stable string tag, prefix of the deterministic event id
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PayoutCreated => "payout.created",
            EventKind::PayoutProcessingStarted => "payout.processing",
            EventKind::PayoutCompleted => "payout.completed",
            EventKind::PayoutRetryScheduled => "payout.retry_scheduled",
            EventKind::PayoutFailed => "payout.failed",
            EventKind::PayoutCancelled => "payout.cancelled",
        }
    }
}

/// Committed event in the ordered log. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Producer-chosen unique id, the dedup key
    pub event_id: String,

    /// Dense global position, assigned at commit
    pub sequence: u64,

    /// Aggregate kind
    pub aggregate_type: AggregateType,

    /// Aggregate identifier
    pub aggregate_id: String,

    /// Event type tag
    pub kind: EventKind,

    /// Opaque payload
    pub payload: HashMap<String, serde_json::Value>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Payout lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayoutStatus {
    /// Accepted, not yet claimed
    Pending,
    /// Claimed by a worker
    Processing,
    /// Settled and posted (terminal)
    Completed,
    /// Exhausted or permanently rejected (terminal)
    Failed,
    /// Withdrawn before processing (terminal)
    Cancelled,
}

impl PayoutStatus {
    /// True for states with no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PayoutStatus::Completed | PayoutStatus::Failed | PayoutStatus::Cancelled
        )
    }

    /// Explicit transition table of the payout state machine
    pub fn can_transition_to(&self, to: PayoutStatus) -> bool {
        matches!(
            (self, to),
            (PayoutStatus::Pending, PayoutStatus::Processing)
                | (PayoutStatus::Pending, PayoutStatus::Cancelled)
                | (PayoutStatus::Processing, PayoutStatus::Completed)
                | (PayoutStatus::Processing, PayoutStatus::Failed)
        )
    }

    /// Stable string tag for payloads and summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Failed => "failed",
            PayoutStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payout record. Lifecycle is driven only through the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    /// Identifier (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Caller-supplied dedup key, unique
    pub idempotency_key: String,

    /// Amount to pay out
    pub amount: Amount,

    /// Recipient account at the external provider
    pub recipient_account: String,

    /// Recipient display name
    pub recipient_name: String,

    /// Free-form description
    pub description: String,

    /// Caller metadata
    pub metadata: HashMap<String, String>,

    /// Current lifecycle state
    pub status: PayoutStatus,

    /// Ledger transaction posted on completion
    pub linked_transaction_id: Option<TransactionId>,

    /// Provider-side id, set on external success
    pub external_payout_id: Option<String>,

    /// Last failure message
    pub error_message: Option<String>,

    /// Number of failed attempts so far
    pub retry_count: u32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last state change
    pub updated_at: DateTime<Utc>,

    /// Terminal processing timestamp
    pub processed_at: Option<DateTime<Utc>>,
}

impl Payout {
    /// True once the payout can no longer change state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Read-model row: running balance per account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// Account
    pub account_id: AccountId,

    /// Currency of the sums
    pub currency: Currency,

    /// Signed balance on the account's normal side (presentation value)
    pub balance: Decimal,

    /// Raw Σ(debits) − Σ(credits), kept for audit
    pub debits_minus_credits: Decimal,

    /// Event-log position the balance is current as of
    pub as_of_sequence: u64,
}

impl AccountBalance {
    /// Zero balance for a freshly opened account
    pub fn opening(account: &Account) -> Self {
        Self {
            account_id: account.id,
            currency: account.currency,
            balance: Decimal::ZERO,
            debits_minus_credits: Decimal::ZERO,
            as_of_sequence: 0,
        }
    }
}

/// Read-model row: denormalized payout for list queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutSummary {
    /// Payout id
    pub payout_id: Uuid,

    /// Dedup key
    pub idempotency_key: String,

    /// Amount value
    pub amount: Decimal,

    /// Currency
    pub currency: Currency,

    /// Recipient display name
    pub recipient_name: String,

    /// Current status
    pub status: PayoutStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last state change
    pub updated_at: DateTime<Utc>,
}

impl PayoutSummary {
    /// Project a payout row into its summary
    pub fn from_payout(payout: &Payout) -> Self {
        Self {
            payout_id: payout.id,
            idempotency_key: payout.idempotency_key.clone(),
            amount: payout.amount.value(),
            currency: payout.amount.currency(),
            recipient_name: payout.recipient_name.clone(),
            status: payout.status,
            created_at: payout.created_at,
            updated_at: payout.updated_at,
        }
    }
}

/// Read-model row: one line per posted transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSummary {
    /// Transaction id
    pub transaction_id: TransactionId,

    /// Code of the debited account
    pub debit_account: String,

    /// Code of the credited account
    pub credit_account: String,

    /// Moved amount
    pub amount: Decimal,

    /// Currency
    pub currency: Currency,

    /// Posting timestamp
    pub created_at: DateTime<Utc>,
}

/// Cursor for `(created_at, id)` keyset pagination. Offset pagination is
/// deliberately not offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    /// Creation timestamp of the last seen row
    pub created_at: DateTime<Utc>,

    /// Id of the last seen row
    pub id: Uuid,
}

/// One page of entries plus the cursor to continue from
#[derive(Debug, Clone)]
pub struct EntryPage {
    /// Entries in `(created_at, id)` order
    pub entries: Vec<LedgerEntry>,

    /// Cursor of the last entry, absent when the page is final
    pub next: Option<PageCursor>,
}

/// One page of payouts plus the cursor to continue from
#[derive(Debug, Clone)]
pub struct PayoutPage {
    /// Payouts in `(created_at, id)` order
    pub payouts: Vec<Payout>,

    /// Cursor of the last payout, absent when the page is final
    pub next: Option<PageCursor>,
}
