//! Single-writer storage engine
//!
//! All tables live behind one write lock. A unit of work stages its writes
//! against a snapshot of the committed state and applies them only when the
//! closure returns `Ok`; an `Err` leaves no trace, including no consumed
//! event sequence numbers. Holding the lock for the whole unit serializes
//! every state transition, which subsumes row-level `SELECT ... FOR UPDATE`:
//! transitions of one payout are totally ordered and no unit ever observes
//! another unit's partial writes.
//!
//! # Tables
//!
//! - `accounts` - Account catalog (unique code index)
//! - `transactions` / `entries` - Append-only double-entry books
//! - `events` - Ordered event log (unique event id, dense sequence)
//! - `payouts` - Payout rows (unique idempotency key index)
//! - `balances` / `payout_summaries` / `transaction_summaries` - Read models

use crate::{
    error::{Error, Result},
    metrics::Metrics,
    types::{
        Account, AccountBalance, AccountId, AggregateType, EntryPage, EventRecord, LedgerEntry,
        LedgerTransaction, PageCursor, Payout, PayoutPage, PayoutStatus, PayoutSummary,
        TransactionId, TransactionSummary,
    },
};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// Source of event sequence numbers.
///
/// The default [`GaplessCounter`] yields the dense set {1..N} over committed
/// events. A skip-tolerant allocator (database-sequence style, where aborted
/// reservations are lost) may be plugged in instead; doing so weakens the
/// density guarantee to "strictly increasing".
pub trait SequenceAllocator: Send + Sync {
    /// Highest sequence number ever committed
    fn last_committed(&self) -> u64;

    /// Record `high` as committed at the end of a successful unit
    fn commit(&mut self, high: u64);
}

/// Dense allocator. Units reserve numbers from `last_committed + 1` upward;
/// reservations of aborted units are never observable.
#[derive(Debug, Default)]
pub struct GaplessCounter {
    last: u64,
}

impl SequenceAllocator for GaplessCounter {
    fn last_committed(&self) -> u64 {
        self.last
    }

    fn commit(&mut self, high: u64) {
        debug_assert!(high >= self.last);
        self.last = high;
    }
}

/// Committed state
struct Tables {
    accounts: HashMap<AccountId, Account>,
    account_codes: HashMap<String, AccountId>,

    transactions: HashMap<TransactionId, LedgerTransaction>,
    entries: Vec<LedgerEntry>,
    entries_by_account: HashMap<AccountId, Vec<usize>>,
    entries_by_transaction: HashMap<TransactionId, Vec<usize>>,

    events: Vec<EventRecord>,
    events_by_id: HashMap<String, usize>,

    payouts: HashMap<Uuid, Payout>,
    payouts_by_key: HashMap<String, Uuid>,

    balances: HashMap<AccountId, AccountBalance>,
    payout_summaries: HashMap<Uuid, PayoutSummary>,
    transaction_summaries: HashMap<TransactionId, TransactionSummary>,

    allocator: Box<dyn SequenceAllocator>,
}

impl Tables {
    fn new(allocator: Box<dyn SequenceAllocator>) -> Self {
        Self {
            accounts: HashMap::new(),
            account_codes: HashMap::new(),
            transactions: HashMap::new(),
            entries: Vec::new(),
            entries_by_account: HashMap::new(),
            entries_by_transaction: HashMap::new(),
            events: Vec::new(),
            events_by_id: HashMap::new(),
            payouts: HashMap::new(),
            payouts_by_key: HashMap::new(),
            balances: HashMap::new(),
            payout_summaries: HashMap::new(),
            transaction_summaries: HashMap::new(),
            allocator,
        }
    }

    /// Apply a staged unit. Infallible: every constraint was checked against
    /// this same state under the lock before commit.
    fn apply(&mut self, staged: Staged, high_sequence: u64) {
        for account in staged.accounts {
            self.account_codes.insert(account.code.clone(), account.id);
            self.accounts.insert(account.id, account);
        }

        for txn in staged.transactions {
            self.transactions.insert(txn.id.clone(), txn);
        }

        for entry in staged.entries {
            let idx = self.entries.len();
            self.entries_by_account
                .entry(entry.account_id)
                .or_default()
                .push(idx);
            self.entries_by_transaction
                .entry(entry.transaction_id.clone())
                .or_default()
                .push(idx);
            self.entries.push(entry);
        }

        for event in staged.events {
            debug_assert_eq!(
                event.sequence as usize,
                self.events.len() + 1,
                "event sequence must stay dense"
            );
            self.events_by_id
                .insert(event.event_id.clone(), self.events.len());
            self.events.push(event);
        }

        for payout in staged.payouts {
            self.payouts_by_key
                .insert(payout.idempotency_key.clone(), payout.id);
            self.payouts.insert(payout.id, payout);
        }

        for balance in staged.balances {
            self.balances.insert(balance.account_id, balance);
        }

        for summary in staged.payout_summaries {
            self.payout_summaries.insert(summary.payout_id, summary);
        }

        for summary in staged.transaction_summaries {
            self.transaction_summaries
                .insert(summary.transaction_id.clone(), summary);
        }

        self.allocator.commit(high_sequence);
    }
}

/// Writes staged by one unit of work
#[derive(Default)]
struct Staged {
    accounts: Vec<Account>,
    transactions: Vec<LedgerTransaction>,
    entries: Vec<LedgerEntry>,
    events: Vec<EventRecord>,
    payouts: Vec<Payout>,
    balances: Vec<AccountBalance>,
    payout_summaries: Vec<PayoutSummary>,
    transaction_summaries: Vec<TransactionSummary>,
}

/// Handle to one atomic unit.
///
/// Reads see the committed snapshot overlaid with this unit's own staged
/// writes (read-your-writes). Writes accumulate and become visible only when
/// the enclosing [`Store::atomically`] closure returns `Ok`.
pub struct UnitOfWork<'a> {
    tables: &'a Tables,
    staged: Staged,
    next_sequence: u64,
}

impl<'a> UnitOfWork<'a> {
    fn new(tables: &'a Tables) -> Self {
        Self {
            tables,
            staged: Staged::default(),
            next_sequence: tables.allocator.last_committed(),
        }
    }

    // Reads

    /// Look up an account by id
    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.staged
            .accounts
            .iter()
            .rev()
            .find(|a| a.id == id)
            .or_else(|| self.tables.accounts.get(&id))
    }

    /// Look up an account by its unique code
    pub fn account_by_code(&self, code: &str) -> Option<&Account> {
        self.staged
            .accounts
            .iter()
            .rev()
            .find(|a| a.code == code)
            .or_else(|| {
                self.tables
                    .account_codes
                    .get(code)
                    .and_then(|id| self.tables.accounts.get(id))
            })
    }

    /// Look up a transaction header
    pub fn transaction(&self, id: &TransactionId) -> Option<&LedgerTransaction> {
        self.staged
            .transactions
            .iter()
            .rev()
            .find(|t| &t.id == id)
            .or_else(|| self.tables.transactions.get(id))
    }

    /// Entries of a transaction, committed and staged
    pub fn entries_for_transaction(&self, id: &TransactionId) -> Vec<LedgerEntry> {
        let mut entries: Vec<LedgerEntry> = self
            .tables
            .entries_by_transaction
            .get(id)
            .map(|idxs| idxs.iter().map(|&i| self.tables.entries[i].clone()).collect())
            .unwrap_or_default();
        entries.extend(
            self.staged
                .entries
                .iter()
                .filter(|e| &e.transaction_id == id)
                .cloned(),
        );
        entries
    }

    /// Look up a payout by id
    pub fn payout(&self, id: Uuid) -> Option<&Payout> {
        self.staged
            .payouts
            .iter()
            .rev()
            .find(|p| p.id == id)
            .or_else(|| self.tables.payouts.get(&id))
    }

    /// Look up a payout by its idempotency key
    pub fn payout_by_key(&self, key: &str) -> Option<&Payout> {
        self.staged
            .payouts
            .iter()
            .rev()
            .find(|p| p.idempotency_key == key)
            .or_else(|| {
                self.tables
                    .payouts_by_key
                    .get(key)
                    .and_then(|id| self.tables.payouts.get(id))
            })
    }

    /// Look up an event by its dedup id
    pub fn event_by_id(&self, event_id: &str) -> Option<&EventRecord> {
        self.staged
            .events
            .iter()
            .rev()
            .find(|e| e.event_id == event_id)
            .or_else(|| {
                self.tables
                    .events_by_id
                    .get(event_id)
                    .map(|&i| &self.tables.events[i])
            })
    }

    /// Current balance row of an account, if projected
    pub fn balance(&self, account_id: AccountId) -> Option<&AccountBalance> {
        self.staged
            .balances
            .iter()
            .rev()
            .find(|b| b.account_id == account_id)
            .or_else(|| self.tables.balances.get(&account_id))
    }

    /// Latest sequence number visible to this unit (committed or staged)
    pub fn current_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Reserve the next sequence number for an event staged in this unit
    pub fn allocate_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    // Writes

    /// Stage a new account. Fails if the code is taken.
    pub fn insert_account(&mut self, account: Account) -> Result<()> {
        if self.account_by_code(&account.code).is_some() {
            return Err(Error::AccountExists(account.code));
        }
        self.staged.accounts.push(account);
        Ok(())
    }

    /// Stage a new transaction header. Fails if the id is taken.
    pub fn insert_transaction(&mut self, txn: LedgerTransaction) -> Result<()> {
        if self.transaction(&txn.id).is_some() {
            return Err(Error::DuplicateTransaction(txn.id.to_string()));
        }
        self.staged.transactions.push(txn);
        Ok(())
    }

    /// Stage ledger entries. Entries are append-only; negative amounts are
    /// an invariant breach, not an input error.
    pub fn insert_entries(&mut self, entries: Vec<LedgerEntry>) -> Result<()> {
        for entry in &entries {
            if entry.amount.is_negative() {
                return Err(Error::InvariantViolation(format!(
                    "negative entry amount {} on {}",
                    entry.amount, entry.account_id
                )));
            }
        }
        self.staged.entries.extend(entries);
        Ok(())
    }

    /// Stage an event record created by the event log. The sequence must have
    /// been reserved through [`UnitOfWork::allocate_sequence`].
    pub fn stage_event(&mut self, event: EventRecord) -> Result<()> {
        if self.event_by_id(&event.event_id).is_some() {
            return Err(Error::InvariantViolation(format!(
                "event id staged twice: {}",
                event.event_id
            )));
        }
        self.staged.events.push(event);
        Ok(())
    }

    /// Stage a payout insert or update. The idempotency key of a new payout
    /// must not collide with another payout's key.
    pub fn upsert_payout(&mut self, payout: Payout) -> Result<()> {
        if let Some(existing) = self.payout_by_key(&payout.idempotency_key) {
            if existing.id != payout.id {
                return Err(Error::InvariantViolation(format!(
                    "idempotency key reused across payouts: {}",
                    payout.idempotency_key
                )));
            }
        }
        self.staged.payouts.push(payout);
        Ok(())
    }

    /// Stage a balance row update
    pub fn upsert_balance(&mut self, balance: AccountBalance) {
        self.staged.balances.push(balance);
    }

    /// Stage a payout summary upsert
    pub fn upsert_payout_summary(&mut self, summary: PayoutSummary) {
        self.staged.payout_summaries.push(summary);
    }

    /// Stage a transaction summary insert
    pub fn insert_transaction_summary(&mut self, summary: TransactionSummary) {
        self.staged.transaction_summaries.push(summary);
    }
}

/// Storage engine: the sole authority for ledger, events, payouts, and
/// read models.
pub struct Store {
    tables: RwLock<Tables>,
    metrics: Metrics,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store with the dense sequence allocator
    pub fn new() -> Self {
        Self::with_allocator(Box::new(GaplessCounter::default()))
    }

    /// Create an empty store with a caller-chosen sequence allocator
    pub fn with_allocator(allocator: Box<dyn SequenceAllocator>) -> Self {
        Self {
            tables: RwLock::new(Tables::new(allocator)),
            metrics: Metrics::new(),
        }
    }

    /// Run one atomic unit. The closure's staged writes commit together when
    /// it returns `Ok` and are discarded entirely when it returns `Err`.
    /// Generic over the error type so callers can thread their own errors
    /// through a unit.
    pub fn atomically<T, E>(
        &self,
        f: impl FnOnce(&mut UnitOfWork<'_>) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let mut tables = self.tables.write();

        let (result, staged, high) = {
            let mut uow = UnitOfWork::new(&tables);
            let result = f(&mut uow)?;
            let high = uow.next_sequence;
            (result, uow.staged, high)
        };

        let event_count = staged.events.len() as u64;
        let txn_count = staged.transactions.len() as u64;

        tables.apply(staged, high);

        self.metrics.events_appended.inc_by(event_count);
        self.metrics.transactions_posted.inc_by(txn_count);

        Ok(result)
    }

    /// Storage metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    // Account reads

    /// Account by id
    pub fn account(&self, id: AccountId) -> Option<Account> {
        self.tables.read().accounts.get(&id).cloned()
    }

    /// Account by unique code
    pub fn account_by_code(&self, code: &str) -> Option<Account> {
        let tables = self.tables.read();
        tables
            .account_codes
            .get(code)
            .and_then(|id| tables.accounts.get(id))
            .cloned()
    }

    /// All accounts
    pub fn all_accounts(&self) -> Vec<Account> {
        self.tables.read().accounts.values().cloned().collect()
    }

    // Ledger reads

    /// Transaction header by id
    pub fn transaction(&self, id: &TransactionId) -> Option<LedgerTransaction> {
        self.tables.read().transactions.get(id).cloned()
    }

    /// All transaction headers
    pub fn all_transactions(&self) -> Vec<LedgerTransaction> {
        self.tables.read().transactions.values().cloned().collect()
    }

    /// Entries of one transaction
    pub fn entries_for_transaction(&self, id: &TransactionId) -> Vec<LedgerEntry> {
        let tables = self.tables.read();
        tables
            .entries_by_transaction
            .get(id)
            .map(|idxs| idxs.iter().map(|&i| tables.entries[i].clone()).collect())
            .unwrap_or_default()
    }

    /// All committed entries
    pub fn all_entries(&self) -> Vec<LedgerEntry> {
        self.tables.read().entries.clone()
    }

    /// Page through an account's entries in `(created_at, id)` order
    pub fn stream_entries(
        &self,
        account_id: AccountId,
        cursor: Option<PageCursor>,
        limit: usize,
    ) -> EntryPage {
        let tables = self.tables.read();
        let mut entries: Vec<LedgerEntry> = tables
            .entries_by_account
            .get(&account_id)
            .map(|idxs| idxs.iter().map(|&i| tables.entries[i].clone()).collect())
            .unwrap_or_default();
        drop(tables);

        entries.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        if let Some(cursor) = cursor {
            entries.retain(|e| (e.created_at, e.id) > (cursor.created_at, cursor.id));
        }
        entries.truncate(limit);

        let next = if entries.len() == limit {
            entries.last().map(|e| PageCursor {
                created_at: e.created_at,
                id: e.id,
            })
        } else {
            None
        };

        EntryPage { entries, next }
    }

    /// Signed balance of an account recomputed from its entries in one pass,
    /// without materializing them for the caller. Returns
    /// `(presentation, debits_minus_credits)`.
    pub fn aggregate_account_balance(
        &self,
        account_id: AccountId,
    ) -> Result<(rust_decimal::Decimal, rust_decimal::Decimal)> {
        let tables = self.tables.read();
        let account = tables
            .accounts
            .get(&account_id)
            .ok_or_else(|| Error::UnknownAccount(account_id.to_string()))?;

        let mut presentation = rust_decimal::Decimal::ZERO;
        let mut raw = rust_decimal::Decimal::ZERO;
        if let Some(idxs) = tables.entries_by_account.get(&account_id) {
            for &i in idxs {
                let entry = &tables.entries[i];
                let (p, r) = crate::projector::signed_delta(
                    account.normal_side,
                    entry.side,
                    entry.amount.value(),
                );
                presentation += p;
                raw += r;
            }
        }
        Ok((presentation, raw))
    }

    // Event reads

    /// Event by its dedup id
    pub fn get_event(&self, event_id: &str) -> Option<EventRecord> {
        let tables = self.tables.read();
        tables
            .events_by_id
            .get(event_id)
            .map(|&i| tables.events[i].clone())
    }

    /// Events with `sequence > since_sequence`, ascending, at most `limit`
    pub fn read_events(&self, since_sequence: u64, limit: usize) -> Vec<EventRecord> {
        let tables = self.tables.read();
        tables
            .events
            .iter()
            .skip(since_sequence as usize)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Full ordered history of one aggregate
    pub fn read_aggregate_history(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: &str,
    ) -> Vec<EventRecord> {
        let tables = self.tables.read();
        tables
            .events
            .iter()
            .filter(|e| e.aggregate_type == aggregate_type && e.aggregate_id == aggregate_id)
            .cloned()
            .collect()
    }

    /// Highest committed sequence number
    pub fn max_sequence(&self) -> u64 {
        self.tables.read().allocator.last_committed()
    }

    // Payout reads

    /// Payout by id
    pub fn get_payout(&self, id: Uuid) -> Option<Payout> {
        self.tables.read().payouts.get(&id).cloned()
    }

    /// Payout by idempotency key
    pub fn get_payout_by_key(&self, key: &str) -> Option<Payout> {
        let tables = self.tables.read();
        tables
            .payouts_by_key
            .get(key)
            .and_then(|id| tables.payouts.get(id))
            .cloned()
    }

    /// All payout rows
    pub fn all_payouts(&self) -> Vec<Payout> {
        self.tables.read().payouts.values().cloned().collect()
    }

    /// Page through payouts in `(created_at, id)` order, optionally filtered
    /// by status
    pub fn list_payouts(
        &self,
        status: Option<PayoutStatus>,
        cursor: Option<PageCursor>,
        limit: usize,
    ) -> PayoutPage {
        let mut payouts = self.all_payouts();
        if let Some(status) = status {
            payouts.retain(|p| p.status == status);
        }
        payouts.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        if let Some(cursor) = cursor {
            payouts.retain(|p| (p.created_at, p.id) > (cursor.created_at, cursor.id));
        }
        payouts.truncate(limit);

        let next = if payouts.len() == limit {
            payouts.last().map(|p| PageCursor {
                created_at: p.created_at,
                id: p.id,
            })
        } else {
            None
        };

        PayoutPage { payouts, next }
    }

    // Read-model access

    /// Balance row of one account
    pub fn account_balance(&self, account_id: AccountId) -> Option<AccountBalance> {
        self.tables.read().balances.get(&account_id).cloned()
    }

    /// All balance rows, sorted by account id
    pub fn balances_snapshot(&self) -> Vec<AccountBalance> {
        let mut rows: Vec<AccountBalance> =
            self.tables.read().balances.values().cloned().collect();
        rows.sort_by_key(|b| b.account_id.as_uuid());
        rows
    }

    /// All payout summaries, sorted by payout id
    pub fn payout_summaries_snapshot(&self) -> Vec<PayoutSummary> {
        let mut rows: Vec<PayoutSummary> = self
            .tables
            .read()
            .payout_summaries
            .values()
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.payout_id);
        rows
    }

    /// All transaction summaries, sorted by transaction id
    pub fn transaction_summaries_snapshot(&self) -> Vec<TransactionSummary> {
        let mut rows: Vec<TransactionSummary> = self
            .tables
            .read()
            .transaction_summaries
            .values()
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.transaction_id.as_str().cmp(b.transaction_id.as_str()));
        rows
    }

    /// Replace all read-model rows at once. Used by rebuilds; source tables
    /// are untouched.
    pub fn install_read_models(
        &self,
        balances: Vec<AccountBalance>,
        payout_summaries: Vec<PayoutSummary>,
        transaction_summaries: Vec<TransactionSummary>,
    ) {
        let mut tables = self.tables.write();
        tables.balances = balances.into_iter().map(|b| (b.account_id, b)).collect();
        tables.payout_summaries = payout_summaries
            .into_iter()
            .map(|s| (s.payout_id, s))
            .collect();
        tables.transaction_summaries = transaction_summaries
            .into_iter()
            .map(|s| (s.transaction_id.clone(), s))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Amount, Currency, EventKind};
    use chrono::Utc;
    use std::collections::HashMap;

    fn test_account(code: &str) -> Account {
        Account {
            id: AccountId::generate(),
            code: code.to_string(),
            account_type: crate::types::AccountType::Asset,
            normal_side: crate::types::AccountType::Asset.normal_side(),
            currency: Currency::USD,
            created_at: Utc::now(),
        }
    }

    fn stage_test_event(uow: &mut UnitOfWork<'_>, event_id: &str) -> EventRecord {
        let sequence = uow.allocate_sequence();
        let event = EventRecord {
            event_id: event_id.to_string(),
            sequence,
            aggregate_type: AggregateType::Payout,
            aggregate_id: "p1".to_string(),
            kind: EventKind::PayoutCreated,
            payload: HashMap::new(),
            created_at: Utc::now(),
        };
        uow.stage_event(event.clone()).unwrap();
        event
    }

    #[test]
    fn test_commit_makes_writes_visible() {
        let store = Store::new();
        let account = test_account("CASH_001");
        let id = account.id;

        store
            .atomically(|uow| uow.insert_account(account.clone()))
            .unwrap();

        assert_eq!(store.account(id).unwrap().code, "CASH_001");
        assert_eq!(store.account_by_code("CASH_001").unwrap().id, id);
    }

    #[test]
    fn test_abort_leaves_no_trace() {
        let store = Store::new();

        let result: Result<()> = store.atomically(|uow| {
            uow.insert_account(test_account("CASH_001"))?;
            stage_test_event(uow, "evt-1");
            Err(Error::Storage("injected".to_string()))
        });

        assert!(result.is_err());
        assert!(store.account_by_code("CASH_001").is_none());
        assert!(store.get_event("evt-1").is_none());
        assert_eq!(store.max_sequence(), 0);
    }

    #[test]
    fn test_sequence_stays_dense_across_aborts() {
        let store = Store::new();

        store
            .atomically(|uow| -> Result<()> {
                stage_test_event(uow, "evt-1");
                Ok(())
            })
            .unwrap();

        // Aborted unit reserves nothing durable
        let _ = store.atomically(|uow| -> Result<()> {
            stage_test_event(uow, "evt-2");
            Err(Error::Storage("injected".to_string()))
        });

        store
            .atomically(|uow| -> Result<()> {
                stage_test_event(uow, "evt-3");
                Ok(())
            })
            .unwrap();

        let events = store.read_events(0, 10);
        let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[test]
    fn test_unique_account_code() {
        let store = Store::new();
        store
            .atomically(|uow| uow.insert_account(test_account("CASH_001")))
            .unwrap();

        let result = store.atomically(|uow| uow.insert_account(test_account("CASH_001")));
        assert!(matches!(result, Err(Error::AccountExists(_))));
    }

    #[test]
    fn test_read_your_writes_within_unit() {
        let store = Store::new();

        store
            .atomically(|uow| -> Result<()> {
                let account = test_account("CASH_001");
                let id = account.id;
                uow.insert_account(account)?;
                assert!(uow.account(id).is_some());
                assert!(uow.account_by_code("CASH_001").is_some());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_negative_entry_amount_rejected() {
        let store = Store::new();
        let account = test_account("CASH_001");
        let account_id = account.id;
        store.atomically(|uow| uow.insert_account(account)).unwrap();

        let result = store.atomically(|uow| {
            uow.insert_entries(vec![LedgerEntry {
                id: Uuid::now_v7(),
                transaction_id: TransactionId::new("t1"),
                account_id,
                side: crate::types::Side::Debit,
                amount: Amount::from_minor_units(-100, Currency::USD),
                created_at: Utc::now(),
            }])
        });
        assert!(matches!(result, Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_stream_entries_pagination() {
        let store = Store::new();
        let account = test_account("CASH_001");
        let account_id = account.id;
        store.atomically(|uow| uow.insert_account(account)).unwrap();

        store
            .atomically(|uow| {
                let entries = (0..5)
                    .map(|i| LedgerEntry {
                        id: Uuid::now_v7(),
                        transaction_id: TransactionId::new(format!("t{}", i)),
                        account_id,
                        side: crate::types::Side::Debit,
                        amount: Amount::from_minor_units(100, Currency::USD),
                        created_at: Utc::now(),
                    })
                    .collect();
                uow.insert_entries(entries)
            })
            .unwrap();

        let page1 = store.stream_entries(account_id, None, 2);
        assert_eq!(page1.entries.len(), 2);
        let cursor = page1.next.expect("more pages");

        let page2 = store.stream_entries(account_id, Some(cursor), 10);
        assert_eq!(page2.entries.len(), 3);
        assert!(page2.next.is_none());

        // No overlap between pages
        assert!(page1.entries.iter().all(|e| page2
            .entries
            .iter()
            .all(|f| f.id != e.id)));
    }
}
