//! Request types for payout intake

use crate::error::{Error, Result};
use ledger_core::{Amount, Currency, Payout};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum accepted idempotency key length
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Intake request as submitted by a client. Amount and currency arrive as
/// strings, matching the wire shape, and are parsed during validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequest {
    /// Caller-supplied dedup key
    pub idempotency_key: String,

    /// Decimal string, strictly positive (e.g. `"100.00"`)
    pub amount: String,

    /// ISO 4217 code
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Recipient account at the external provider
    pub recipient_account: String,

    /// Recipient display name
    pub recipient_name: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Caller metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_currency() -> String {
    Currency::default().code().to_string()
}

impl PayoutRequest {
    /// Validate field rules and parse the amount. Returns the parsed amount
    /// on success.
    pub fn validate(&self) -> Result<Amount> {
        if self.idempotency_key.trim().is_empty() {
            return Err(Error::Validation(
                "idempotency_key is required".to_string(),
            ));
        }
        if self.idempotency_key.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(Error::Validation(format!(
                "idempotency_key exceeds {} characters",
                MAX_IDEMPOTENCY_KEY_LEN
            )));
        }
        if self.recipient_account.trim().is_empty() {
            return Err(Error::Validation(
                "recipient_account is required".to_string(),
            ));
        }
        if self.recipient_name.trim().is_empty() {
            return Err(Error::Validation("recipient_name is required".to_string()));
        }

        let currency = Currency::parse(&self.currency)
            .ok_or_else(|| Error::Validation(format!("unsupported currency: {}", self.currency)))?;

        let amount = Amount::parse(&self.amount, currency)
            .map_err(|e| Error::Validation(e.to_string()))?;
        if !amount.is_positive() {
            return Err(Error::Validation(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }

        Ok(amount)
    }

    /// True when a stored payout's immutable fields match this request,
    /// i.e. a resubmission is an idempotent replay rather than a conflict.
    pub fn matches(&self, payout: &Payout, amount: &Amount) -> bool {
        payout.amount == *amount
            && payout.recipient_account == self.recipient_account
            && payout.recipient_name == self.recipient_name
            && payout.description == self.description
            && payout.metadata == self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn valid_request() -> PayoutRequest {
        PayoutRequest {
            idempotency_key: "k1".to_string(),
            amount: "100.00".to_string(),
            currency: "USD".to_string(),
            recipient_account: "acct_123".to_string(),
            recipient_name: "Jane Doe".to_string(),
            description: "invoice 42".to_string(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_valid_request_parses_amount() {
        let amount = valid_request().validate().unwrap();
        assert_eq!(amount.value(), Decimal::new(10000, 2));
        assert_eq!(amount.currency(), Currency::USD);
    }

    #[test]
    fn test_missing_key_rejected() {
        let mut request = valid_request();
        request.idempotency_key = "  ".to_string();
        assert!(matches!(request.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_overlong_key_rejected() {
        let mut request = valid_request();
        request.idempotency_key = "k".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1);
        assert!(matches!(request.validate(), Err(Error::Validation(_))));

        request.idempotency_key = "k".repeat(MAX_IDEMPOTENCY_KEY_LEN);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        for amount in ["0.00", "-5.00"] {
            let mut request = valid_request();
            request.amount = amount.to_string();
            assert!(matches!(request.validate(), Err(Error::Validation(_))));
        }
    }

    #[test]
    fn test_malformed_amount_rejected() {
        for amount in ["abc", "1.005", ""] {
            let mut request = valid_request();
            request.amount = amount.to_string();
            assert!(matches!(request.validate(), Err(Error::Validation(_))));
        }
    }

    #[test]
    fn test_unsupported_currency_rejected() {
        let mut request = valid_request();
        request.currency = "XXX".to_string();
        assert!(matches!(request.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_missing_recipient_rejected() {
        let mut request = valid_request();
        request.recipient_account = String::new();
        assert!(matches!(request.validate(), Err(Error::Validation(_))));

        let mut request = valid_request();
        request.recipient_name = String::new();
        assert!(matches!(request.validate(), Err(Error::Validation(_))));
    }
}
