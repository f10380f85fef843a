//! Account catalog and bootstrap chart
//!
//! Accounts are immutable after creation. The payout flow requires exactly
//! two bootstrap accounts: a cash asset account and a payout-liability
//! account; completing a payout debits the liability and credits cash.

use crate::{
    error::{Error, Result},
    store::{Store, UnitOfWork},
    types::{Account, AccountBalance, AccountId, AccountType, Currency},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Default code of the bootstrap cash account
pub const DEFAULT_CASH_CODE: &str = "CASH_001";

/// Default code of the bootstrap payout-liability account
pub const DEFAULT_PAYOUT_LIABILITY_CODE: &str = "PAYOUT_LIABILITY_001";

/// Chart configuration: which two accounts payouts settle against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Code of the cash asset account
    pub cash_code: String,

    /// Code of the payout-liability account
    pub payout_liability_code: String,

    /// Operating currency of both accounts
    pub currency: Currency,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            cash_code: DEFAULT_CASH_CODE.to_string(),
            payout_liability_code: DEFAULT_PAYOUT_LIABILITY_CODE.to_string(),
            currency: Currency::USD,
        }
    }
}

/// Resolved ids of the bootstrap accounts
#[derive(Debug, Clone, Copy)]
pub struct ChartHandles {
    /// Cash asset account
    pub cash: AccountId,

    /// Payout-liability account
    pub payout_liability: AccountId,
}

/// Open a new account inside the current unit, together with its zero
/// balance row. Fails if the code is taken.
pub fn open_account(
    uow: &mut UnitOfWork<'_>,
    code: &str,
    account_type: AccountType,
    currency: Currency,
) -> Result<Account> {
    if code.trim().is_empty() {
        return Err(Error::Config("account code must not be empty".to_string()));
    }

    let account = Account {
        id: AccountId::generate(),
        code: code.to_string(),
        account_type,
        normal_side: account_type.normal_side(),
        currency,
        created_at: Utc::now(),
    };

    uow.insert_account(account.clone())?;
    uow.upsert_balance(AccountBalance::opening(&account));

    tracing::info!(
        account_id = %account.id,
        code = %account.code,
        account_type = ?account.account_type,
        "Account opened"
    );

    Ok(account)
}

/// Create the two bootstrap accounts if absent. Idempotent; repeated calls
/// return the same handles.
pub fn ensure_bootstrap_accounts(store: &Store, config: &ChartConfig) -> Result<ChartHandles> {
    store.atomically(|uow| {
        let cash = match uow.account_by_code(&config.cash_code) {
            Some(existing) => existing.clone(),
            None => open_account(uow, &config.cash_code, AccountType::Asset, config.currency)?,
        };

        let payout_liability = match uow.account_by_code(&config.payout_liability_code) {
            Some(existing) => existing.clone(),
            None => open_account(
                uow,
                &config.payout_liability_code,
                AccountType::Liability,
                config.currency,
            )?,
        };

        Ok(ChartHandles {
            cash: cash.id,
            payout_liability: payout_liability.id,
        })
    })
}
