//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify the critical invariants:
//! - Balance to zero: Σ(debits) == Σ(credits) per transaction, two entries
//! - Non-negativity: no committed entry carries a negative amount
//! - Sequence density: committed events form {1..N} with no duplicates
//! - Rebuild equivalence: recomputed read models equal incremental rows

use ledger_core::{
    accounts::{ensure_bootstrap_accounts, ChartConfig, ChartHandles},
    events::append_event,
    ledger::{Ledger, NewTransaction},
    types::{AggregateType, Amount, Currency, EventKind, Side, TransactionId},
    Store,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Strategy for generating valid amounts in minor units
fn minor_units_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000_00
}

fn test_store() -> (Arc<Store>, Ledger, ChartHandles) {
    let store = Arc::new(Store::new());
    let handles = ensure_bootstrap_accounts(&store, &ChartConfig::default()).unwrap();
    let ledger = Ledger::new(store.clone());
    (store, ledger, handles)
}

fn payout_posting(handles: &ChartHandles, id: &str, minor: i64) -> NewTransaction {
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

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: every committed transaction balances to zero with exactly
    /// two entries
    #[test]
    fn prop_transactions_balance_to_zero(amounts in prop::collection::vec(minor_units_strategy(), 1..20)) {
        let (store, ledger, handles) = test_store();

        for (i, minor) in amounts.iter().enumerate() {
            ledger
                .create_balanced_transaction(payout_posting(&handles, &format!("t{}", i), *minor))
                .unwrap();
        }

        for txn in store.all_transactions() {
            let entries = store.entries_for_transaction(&txn.id);
            prop_assert_eq!(entries.len(), 2);

            let debits: Decimal = entries
                .iter()
                .filter(|e| e.side == Side::Debit)
                .map(|e| e.amount.value())
                .sum();
            let credits: Decimal = entries
                .iter()
                .filter(|e| e.side == Side::Credit)
                .map(|e| e.amount.value())
                .sum();
            prop_assert_eq!(debits, credits);
        }
    }

    /// Property: no committed entry is negative
    #[test]
    fn prop_entries_non_negative(amounts in prop::collection::vec(minor_units_strategy(), 1..20)) {
        let (store, ledger, handles) = test_store();

        for (i, minor) in amounts.iter().enumerate() {
            ledger
                .create_balanced_transaction(payout_posting(&handles, &format!("t{}", i), *minor))
                .unwrap();
        }

        for entry in store.all_entries() {
            prop_assert!(!entry.amount.is_negative());
        }
    }

    /// Property: committed sequences form the dense set {1..N} even when
    /// some units abort
    #[test]
    fn prop_sequence_density(outcomes in prop::collection::vec(any::<bool>(), 1..40)) {
        let store = Store::new();

        for (i, commit) in outcomes.iter().enumerate() {
            let result = store.atomically(|uow| {
                append_event(
                    uow,
                    format!("evt-{}", i),
                    AggregateType::Payout,
                    "p1",
                    EventKind::PayoutCreated,
                    HashMap::new(),
                )?;
                if *commit {
                    Ok(())
                } else {
                    Err(ledger_core::Error::Storage("injected abort".to_string()))
                }
            });
            prop_assert_eq!(result.is_ok(), *commit);
        }

        let events = store.read_events(0, usize::MAX);
        let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
        let expected: Vec<u64> = (1..=sequences.len() as u64).collect();
        prop_assert_eq!(&sequences, &expected);

        let unique: HashSet<u64> = sequences.iter().copied().collect();
        prop_assert_eq!(unique.len(), sequences.len());
        prop_assert_eq!(store.max_sequence(), sequences.len() as u64);
    }

    /// Property: rebuilding the read models reproduces the incremental rows
    /// exactly, for any posting history
    #[test]
    fn prop_rebuild_equivalence(amounts in prop::collection::vec(minor_units_strategy(), 0..15)) {
        let (store, ledger, handles) = test_store();

        for (i, minor) in amounts.iter().enumerate() {
            ledger
                .create_balanced_transaction(payout_posting(&handles, &format!("t{}", i), *minor))
                .unwrap();
        }

        let balances = store.balances_snapshot();
        let payout_summaries = store.payout_summaries_snapshot();
        let transaction_summaries = store.transaction_summaries_snapshot();

        ledger_core::projector::rebuild(&store).unwrap();

        prop_assert_eq!(store.balances_snapshot(), balances);
        prop_assert_eq!(store.payout_summaries_snapshot(), payout_summaries);
        prop_assert_eq!(store.transaction_summaries_snapshot(), transaction_summaries);
    }

    /// Property: the projected balance equals the aggregation over entries
    #[test]
    fn prop_balance_matches_aggregation(amounts in prop::collection::vec(minor_units_strategy(), 1..15)) {
        let (_store, ledger, handles) = test_store();

        for (i, minor) in amounts.iter().enumerate() {
            ledger
                .create_balanced_transaction(payout_posting(&handles, &format!("t{}", i), *minor))
                .unwrap();
        }

        for account in [handles.cash, handles.payout_liability] {
            let projected = ledger.account_balance(account).unwrap();
            let recomputed = ledger.compute_account_balance(account).unwrap();
            prop_assert_eq!(projected, recomputed);
        }
    }
}

#[cfg(test)]
mod immutability_tests {
    use super::*;

    /// After commit, replays and failed postings leave committed rows
    /// untouched
    #[test]
    fn test_committed_rows_never_change() {
        let (store, ledger, handles) = test_store();

        ledger
            .create_balanced_transaction(payout_posting(&handles, "t1", 100_00))
            .unwrap();

        let txn_before = store.transaction(&TransactionId::new("t1")).unwrap();
        let entries_before = store.entries_for_transaction(&txn_before.id);
        let events_before = store.read_events(0, usize::MAX);

        // Idempotent replay
        ledger
            .create_balanced_transaction(payout_posting(&handles, "t1", 100_00))
            .unwrap();
        // Conflicting replay, rejected
        let _ = ledger.create_balanced_transaction(payout_posting(&handles, "t1", 200_00));
        // Unrelated aborted unit
        let _ = store.atomically(|_uow| -> ledger_core::Result<()> {
            Err(ledger_core::Error::Storage("injected".to_string()))
        });

        assert_eq!(store.transaction(&txn_before.id).unwrap(), txn_before);
        assert_eq!(store.entries_for_transaction(&txn_before.id), entries_before);
        assert_eq!(store.read_events(0, usize::MAX), events_before);
    }
}
