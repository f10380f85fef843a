//! Double-entry posting and balance queries
//!
//! Every transaction is exactly two immutable entries of equal magnitude on
//! opposite sides, persisted together with the header in one atomic unit.
//! Posting is idempotent on the transaction id: replaying an identical
//! payload returns the committed transaction, replaying a different payload
//! is a conflict.

use crate::{
    error::{Error, Result},
    projector,
    store::{Store, UnitOfWork},
    types::{
        Amount, AccountId, EntryPage, LedgerEntry, LedgerTransaction, PageCursor, Side,
        TransactionId,
    },
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Input of one balanced posting
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Transaction id, deterministic for payout postings
    pub id: TransactionId,

    /// Debited account
    pub debit_account: AccountId,

    /// Debit leg amount
    pub debit_amount: Amount,

    /// Credited account
    pub credit_account: AccountId,

    /// Credit leg amount, must equal the debit leg
    pub credit_amount: Amount,

    /// Free-form description
    pub description: String,
}

/// Outcome of a posting attempt
#[derive(Debug, Clone)]
pub enum Posting {
    /// Freshly posted in this unit
    Created {
        /// Committed header
        transaction: LedgerTransaction,
        /// The two entries
        entries: Vec<LedgerEntry>,
    },
    /// Identical transaction already committed; idempotent replay
    Existing {
        /// Committed header
        transaction: LedgerTransaction,
        /// The two entries
        entries: Vec<LedgerEntry>,
    },
}

impl Posting {
    /// Committed header regardless of outcome
    pub fn transaction(&self) -> &LedgerTransaction {
        match self {
            Posting::Created { transaction, .. } | Posting::Existing { transaction, .. } => {
                transaction
            }
        }
    }
}

/// Post a balanced transaction within the current atomic unit.
///
/// Validation order: amounts positive, legs balanced, accounts known and in
/// the entry currency, then the idempotency check against an existing id.
pub fn post_balanced_transaction(
    uow: &mut UnitOfWork<'_>,
    new: &NewTransaction,
) -> Result<Posting> {
    if !new.debit_amount.is_positive() || !new.credit_amount.is_positive() {
        return Err(Error::NonPositiveAmount(format!(
            "debit {} / credit {}",
            new.debit_amount, new.credit_amount
        )));
    }

    if new.debit_amount != new.credit_amount {
        return Err(Error::Unbalanced {
            debit: new.debit_amount.to_string(),
            credit: new.credit_amount.to_string(),
        });
    }

    for (account_id, amount) in [
        (new.debit_account, new.debit_amount),
        (new.credit_account, new.credit_amount),
    ] {
        let account = uow
            .account(account_id)
            .ok_or_else(|| Error::UnknownAccount(account_id.to_string()))?;
        if account.currency != amount.currency() {
            return Err(Error::CurrencyMismatch {
                left: account.currency,
                right: amount.currency(),
            });
        }
    }

    if let Some(existing) = uow.transaction(&new.id) {
        let existing = existing.clone();
        let entries = uow.entries_for_transaction(&new.id);
        return if matches_existing(new, &existing, &entries) {
            Ok(Posting::Existing {
                transaction: existing,
                entries,
            })
        } else {
            Err(Error::TransactionConflict(new.id.to_string()))
        };
    }

    let now = Utc::now();
    let transaction = LedgerTransaction {
        id: new.id.clone(),
        description: new.description.clone(),
        posted_sequence: uow.current_sequence(),
        created_at: now,
    };

    let entries = vec![
        LedgerEntry {
            id: Uuid::now_v7(),
            transaction_id: new.id.clone(),
            account_id: new.debit_account,
            side: Side::Debit,
            amount: new.debit_amount,
            created_at: now,
        },
        LedgerEntry {
            id: Uuid::now_v7(),
            transaction_id: new.id.clone(),
            account_id: new.credit_account,
            side: Side::Credit,
            amount: new.credit_amount,
            created_at: now,
        },
    ];

    uow.insert_transaction(transaction.clone())?;
    uow.insert_entries(entries.clone())?;

    tracing::info!(
        transaction_id = %transaction.id,
        amount = %new.debit_amount,
        "Balanced transaction posted"
    );

    Ok(Posting::Created {
        transaction,
        entries,
    })
}

/// Compare a posting request against a committed transaction
fn matches_existing(
    new: &NewTransaction,
    existing: &LedgerTransaction,
    entries: &[LedgerEntry],
) -> bool {
    if existing.description != new.description || entries.len() != 2 {
        return false;
    }

    let debit = entries.iter().find(|e| e.side == Side::Debit);
    let credit = entries.iter().find(|e| e.side == Side::Credit);
    match (debit, credit) {
        (Some(debit), Some(credit)) => {
            debit.account_id == new.debit_account
                && debit.amount == new.debit_amount
                && credit.account_id == new.credit_account
                && credit.amount == new.credit_amount
        }
        _ => false,
    }
}

/// High-level ledger interface over the storage engine
pub struct Ledger {
    store: Arc<Store>,
}

impl Ledger {
    /// Wrap a store
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Post a balanced transaction in its own atomic unit and project the
    /// affected read-model rows with it.
    pub fn create_balanced_transaction(&self, new: NewTransaction) -> Result<LedgerTransaction> {
        self.store.atomically(|uow| {
            let posting = post_balanced_transaction(uow, &new)?;
            match posting {
                Posting::Created {
                    transaction,
                    entries,
                } => {
                    let as_of = uow.current_sequence();
                    projector::apply_ledger_entries(uow, &transaction, &entries, as_of)?;
                    Ok(transaction)
                }
                // Replay of an identical payload: rows and projections are
                // already committed
                Posting::Existing { transaction, .. } => Ok(transaction),
            }
        })
    }

    /// Balance of an account from the read model
    pub fn account_balance(&self, account_id: AccountId) -> Result<Amount> {
        let row = self
            .store
            .account_balance(account_id)
            .ok_or_else(|| Error::UnknownAccount(account_id.to_string()))?;
        Ok(Amount::new(row.balance, row.currency))
    }

    /// Balance recomputed from entries in a single aggregation pass,
    /// bypassing the read model (forced refresh)
    pub fn compute_account_balance(&self, account_id: AccountId) -> Result<Amount> {
        let account = self
            .store
            .account(account_id)
            .ok_or_else(|| Error::UnknownAccount(account_id.to_string()))?;
        let (presentation, _raw) = self.store.aggregate_account_balance(account_id)?;
        Ok(Amount::new(presentation, account.currency))
    }

    /// Page through an account's entries in `(created_at, id)` order
    pub fn stream_entries(
        &self,
        account_id: AccountId,
        cursor: Option<PageCursor>,
        limit: usize,
    ) -> Result<EntryPage> {
        if self.store.account(account_id).is_none() {
            return Err(Error::UnknownAccount(account_id.to_string()));
        }
        Ok(self.store.stream_entries(account_id, cursor, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{ensure_bootstrap_accounts, ChartConfig, ChartHandles};
    use crate::types::Currency;
    use rust_decimal::Decimal;

    fn test_ledger() -> (Ledger, ChartHandles) {
        let store = Arc::new(Store::new());
        let handles = ensure_bootstrap_accounts(&store, &ChartConfig::default()).unwrap();
        (Ledger::new(store), handles)
    }

    fn posting(handles: &ChartHandles, id: &str, minor: i64) -> NewTransaction {
        let amount = Amount::from_minor_units(minor, Currency::USD);
        NewTransaction {
            id: TransactionId::new(id),
            debit_account: handles.payout_liability,
            debit_amount: amount,
            credit_account: handles.cash,
            credit_amount: amount,
            description: "payout settlement".to_string(),
        }
    }

    #[test]
    fn test_post_balanced_transaction() {
        let (ledger, handles) = test_ledger();

        let txn = ledger
            .create_balanced_transaction(posting(&handles, "t1", 100_00))
            .unwrap();
        assert_eq!(txn.id.as_str(), "t1");

        let entries = ledger.store().entries_for_transaction(&txn.id);
        assert_eq!(entries.len(), 2);
        let debit_total: Decimal = entries
            .iter()
            .filter(|e| e.side == Side::Debit)
            .map(|e| e.amount.value())
            .sum();
        let credit_total: Decimal = entries
            .iter()
            .filter(|e| e.side == Side::Credit)
            .map(|e| e.amount.value())
            .sum();
        assert_eq!(debit_total, credit_total);
    }

    #[test]
    fn test_unbalanced_rejected() {
        let (ledger, handles) = test_ledger();
        let mut new = posting(&handles, "t1", 100_00);
        new.credit_amount = Amount::from_minor_units(99_00, Currency::USD);

        let result = ledger.create_balanced_transaction(new);
        assert!(matches!(result, Err(Error::Unbalanced { .. })));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let (ledger, handles) = test_ledger();
        let result = ledger.create_balanced_transaction(posting(&handles, "t1", 0));
        assert!(matches!(result, Err(Error::NonPositiveAmount(_))));
    }

    #[test]
    fn test_unknown_account_rejected() {
        let (ledger, handles) = test_ledger();
        let mut new = posting(&handles, "t1", 100_00);
        new.debit_account = AccountId::generate();

        let result = ledger.create_balanced_transaction(new);
        assert!(matches!(result, Err(Error::UnknownAccount(_))));
    }

    #[test]
    fn test_currency_mismatch_rejected() {
        let (ledger, handles) = test_ledger();
        let mut new = posting(&handles, "t1", 100_00);
        let eur = Amount::from_minor_units(100_00, Currency::EUR);
        new.debit_amount = eur;
        new.credit_amount = eur;

        let result = ledger.create_balanced_transaction(new);
        assert!(matches!(result, Err(Error::CurrencyMismatch { .. })));
    }

    #[test]
    fn test_idempotent_replay_returns_existing() {
        let (ledger, handles) = test_ledger();
        let new = posting(&handles, "t1", 100_00);

        let first = ledger.create_balanced_transaction(new.clone()).unwrap();
        let replay = ledger.create_balanced_transaction(new).unwrap();

        assert_eq!(first.id, replay.id);
        assert_eq!(first.created_at, replay.created_at);
        assert_eq!(ledger.store().entries_for_transaction(&first.id).len(), 2);

        // Balances unchanged by the replay
        let cash = ledger.account_balance(handles.cash).unwrap();
        assert_eq!(cash.value(), Decimal::new(-10000, 2));
    }

    #[test]
    fn test_same_id_different_payload_conflicts() {
        let (ledger, handles) = test_ledger();
        ledger
            .create_balanced_transaction(posting(&handles, "t1", 100_00))
            .unwrap();

        let result = ledger.create_balanced_transaction(posting(&handles, "t1", 200_00));
        assert!(matches!(result, Err(Error::TransactionConflict(_))));
    }

    #[test]
    fn test_balance_query_matches_aggregation() {
        let (ledger, handles) = test_ledger();
        ledger
            .create_balanced_transaction(posting(&handles, "t1", 100_00))
            .unwrap();
        ledger
            .create_balanced_transaction(posting(&handles, "t2", 25_50))
            .unwrap();

        for account in [handles.cash, handles.payout_liability] {
            let projected = ledger.account_balance(account).unwrap();
            let recomputed = ledger.compute_account_balance(account).unwrap();
            assert_eq!(projected, recomputed);
        }

        // Paying out 125.50 of owed liability against cash shrinks both
        // presentation balances
        let cash = ledger.account_balance(handles.cash).unwrap();
        assert_eq!(cash.value(), Decimal::new(-12550, 2));
        let liability = ledger.account_balance(handles.payout_liability).unwrap();
        assert_eq!(liability.value(), Decimal::new(-12550, 2));
    }
}
