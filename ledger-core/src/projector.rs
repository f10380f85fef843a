//! Read-model projector
//!
//! Projection runs inside the same atomic unit as the source write, so the
//! read model can never contradict source truth; a failing projection aborts
//! the whole unit. Every row is recomputable from source tables alone, and a
//! full rebuild must produce rows equal to incremental application.

use crate::{
    error::{Error, Result},
    store::{Store, UnitOfWork},
    types::{
        AccountBalance, LedgerEntry, LedgerTransaction, Payout, PayoutSummary, Side,
        TransactionSummary,
    },
};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Signed deltas one entry contributes to an account's balance row, given
/// the account's normal side. Returns `(presentation, debits_minus_credits)`.
pub(crate) fn signed_delta(normal_side: Side, entry_side: Side, value: Decimal) -> (Decimal, Decimal) {
    let raw = match entry_side {
        Side::Debit => value,
        Side::Credit => -value,
    };
    let presentation = if entry_side == normal_side { value } else { -value };
    (presentation, raw)
}

/// Apply a freshly posted transaction to the balance rows of the affected
/// accounts and insert its summary line. Must run in the unit that posted
/// the entries.
pub fn apply_ledger_entries(
    uow: &mut UnitOfWork<'_>,
    transaction: &LedgerTransaction,
    entries: &[LedgerEntry],
    as_of_sequence: u64,
) -> Result<()> {
    for entry in entries {
        let account = uow
            .account(entry.account_id)
            .ok_or_else(|| Error::UnknownAccount(entry.account_id.to_string()))?
            .clone();

        let mut balance = uow
            .balance(entry.account_id)
            .cloned()
            .unwrap_or_else(|| AccountBalance::opening(&account));

        if balance.currency != entry.amount.currency() {
            return Err(Error::CurrencyMismatch {
                left: balance.currency,
                right: entry.amount.currency(),
            });
        }

        let (presentation, raw) =
            signed_delta(account.normal_side, entry.side, entry.amount.value());
        balance.balance += presentation;
        balance.debits_minus_credits += raw;
        balance.as_of_sequence = as_of_sequence;
        uow.upsert_balance(balance);
    }

    uow.insert_transaction_summary(summarize(uow, transaction, entries)?);
    Ok(())
}

/// Upsert the denormalized summary of a payout. Must run in the unit that
/// changed the payout.
pub fn apply_payout_change(uow: &mut UnitOfWork<'_>, payout: &Payout) -> Result<()> {
    uow.upsert_payout_summary(PayoutSummary::from_payout(payout));
    Ok(())
}

fn summarize(
    uow: &UnitOfWork<'_>,
    transaction: &LedgerTransaction,
    entries: &[LedgerEntry],
) -> Result<TransactionSummary> {
    let debit = entries
        .iter()
        .find(|e| e.side == Side::Debit)
        .ok_or_else(|| Error::InvariantViolation("transaction without debit leg".to_string()))?;
    let credit = entries
        .iter()
        .find(|e| e.side == Side::Credit)
        .ok_or_else(|| Error::InvariantViolation("transaction without credit leg".to_string()))?;

    let debit_code = uow
        .account(debit.account_id)
        .ok_or_else(|| Error::UnknownAccount(debit.account_id.to_string()))?
        .code
        .clone();
    let credit_code = uow
        .account(credit.account_id)
        .ok_or_else(|| Error::UnknownAccount(credit.account_id.to_string()))?
        .code
        .clone();

    Ok(TransactionSummary {
        transaction_id: transaction.id.clone(),
        debit_account: debit_code,
        credit_account: credit_code,
        amount: debit.amount.value(),
        currency: debit.amount.currency(),
        created_at: transaction.created_at,
    })
}

/// Recompute every read-model row from source tables (entries, transaction
/// headers, payout rows) and install the result wholesale. The outcome is
/// row-equal to what incremental projection produced.
pub fn rebuild(store: &Store) -> Result<()> {
    let accounts = store.all_accounts();
    let transactions = store.all_transactions();
    let entries = store.all_entries();
    let payouts = store.all_payouts();

    // Balances: opening row per account, folded entry deltas, current as of
    // the last transaction that touched the account
    let mut balances: HashMap<_, AccountBalance> = accounts
        .iter()
        .map(|a| (a.id, AccountBalance::opening(a)))
        .collect();
    let headers: HashMap<_, &LedgerTransaction> =
        transactions.iter().map(|t| (&t.id, t)).collect();

    for entry in &entries {
        let account = accounts
            .iter()
            .find(|a| a.id == entry.account_id)
            .ok_or_else(|| Error::UnknownAccount(entry.account_id.to_string()))?;
        // Replay defense: an entry must reference a committed header
        let header = headers
            .get(&entry.transaction_id)
            .ok_or_else(|| Error::TransactionNotFound(entry.transaction_id.to_string()))?;

        let balance = balances
            .get_mut(&entry.account_id)
            .ok_or_else(|| Error::UnknownAccount(entry.account_id.to_string()))?;
        let (presentation, raw) =
            signed_delta(account.normal_side, entry.side, entry.amount.value());
        balance.balance += presentation;
        balance.debits_minus_credits += raw;
        balance.as_of_sequence = balance.as_of_sequence.max(header.posted_sequence);
    }

    // Transaction summaries from headers plus their two entries
    let mut transaction_summaries = Vec::with_capacity(transactions.len());
    for transaction in &transactions {
        let txn_entries: Vec<LedgerEntry> = entries
            .iter()
            .filter(|e| e.transaction_id == transaction.id)
            .cloned()
            .collect();
        let debit = txn_entries
            .iter()
            .find(|e| e.side == Side::Debit)
            .ok_or_else(|| {
                Error::InvariantViolation("transaction without debit leg".to_string())
            })?;
        let credit = txn_entries
            .iter()
            .find(|e| e.side == Side::Credit)
            .ok_or_else(|| {
                Error::InvariantViolation("transaction without credit leg".to_string())
            })?;
        let debit_code = accounts
            .iter()
            .find(|a| a.id == debit.account_id)
            .ok_or_else(|| Error::UnknownAccount(debit.account_id.to_string()))?
            .code
            .clone();
        let credit_code = accounts
            .iter()
            .find(|a| a.id == credit.account_id)
            .ok_or_else(|| Error::UnknownAccount(credit.account_id.to_string()))?
            .code
            .clone();

        transaction_summaries.push(TransactionSummary {
            transaction_id: transaction.id.clone(),
            debit_account: debit_code,
            credit_account: credit_code,
            amount: debit.amount.value(),
            currency: debit.amount.currency(),
            created_at: transaction.created_at,
        });
    }

    let payout_summaries = payouts.iter().map(PayoutSummary::from_payout).collect();

    store.install_read_models(
        balances.into_values().collect(),
        payout_summaries,
        transaction_summaries,
    );
    store.metrics().rebuilds.inc();

    tracing::info!("Read models rebuilt from source tables");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{ensure_bootstrap_accounts, ChartConfig};
    use crate::ledger::{Ledger, NewTransaction};
    use crate::types::{Amount, Currency, TransactionId};
    use std::sync::Arc;

    #[test]
    fn test_signed_delta_by_normal_side() {
        let value = Decimal::new(10000, 2);

        // Debit-normal account: debit increases, credit decreases
        assert_eq!(
            signed_delta(Side::Debit, Side::Debit, value),
            (value, value)
        );
        assert_eq!(
            signed_delta(Side::Debit, Side::Credit, value),
            (-value, -value)
        );

        // Credit-normal account: credit increases, debit decreases
        assert_eq!(
            signed_delta(Side::Credit, Side::Credit, value),
            (value, -value)
        );
        assert_eq!(
            signed_delta(Side::Credit, Side::Debit, value),
            (-value, value)
        );
    }

    #[test]
    fn test_rebuild_matches_incremental_projection() {
        let store = Arc::new(Store::new());
        let handles = ensure_bootstrap_accounts(&store, &ChartConfig::default()).unwrap();
        let ledger = Ledger::new(store.clone());

        for (i, minor) in [100_00i64, 42_17, 9_99].iter().enumerate() {
            let amount = Amount::from_minor_units(*minor, Currency::USD);
            ledger
                .create_balanced_transaction(NewTransaction {
                    id: TransactionId::new(format!("t{}", i)),
                    debit_account: handles.payout_liability,
                    debit_amount: amount,
                    credit_account: handles.cash,
                    credit_amount: amount,
                    description: "payout settlement".to_string(),
                })
                .unwrap();
        }

        let balances_before = store.balances_snapshot();
        let payouts_before = store.payout_summaries_snapshot();
        let transactions_before = store.transaction_summaries_snapshot();

        rebuild(&store).unwrap();

        assert_eq!(store.balances_snapshot(), balances_before);
        assert_eq!(store.payout_summaries_snapshot(), payouts_before);
        assert_eq!(store.transaction_summaries_snapshot(), transactions_before);
    }
}
