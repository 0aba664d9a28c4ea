//! Money in minor units with an ISO 4217 currency code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default currency used when an upstream record carries none.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Errors raised when constructing or combining money amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Currency code is missing.
    #[error("currency is required")]
    CurrencyRequired,

    /// Two amounts in different currencies were combined.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },
}

/// Amount of money represented in minor units (e.g. cents) to avoid floating
/// point issues.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: i64,
    currency: String,
}

impl Money {
    /// Creates a money amount, rejecting an empty currency.
    pub fn new(amount: i64, currency: impl Into<String>) -> Result<Self, MoneyError> {
        let currency = currency.into();
        if currency.trim().is_empty() {
            return Err(MoneyError::CurrencyRequired);
        }
        Ok(Self {
            amount,
            currency: currency.to_ascii_uppercase(),
        })
    }

    /// Zero in the given currency.
    pub fn zero(currency: impl Into<String>) -> Self {
        Self {
            amount: 0,
            currency: currency.into().to_ascii_uppercase(),
        }
    }

    /// Creates an amount in the default currency.
    pub fn usd(amount: i64) -> Self {
        Self {
            amount,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Amount in minor units.
    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// ISO currency code.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn is_negative(&self) -> bool {
        self.amount < 0
    }

    /// Same currency, different amount.
    pub fn with_amount(&self, amount: i64) -> Money {
        Money {
            amount,
            currency: self.currency.clone(),
        }
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            amount: self.amount * i64::from(quantity),
            currency: self.currency.clone(),
        }
    }

    /// Adds two amounts of the same currency.
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(Money {
            amount: self.amount + other.amount,
            currency: self.currency.clone(),
        })
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.abs();
        write!(f, "{sign}{}.{:02} {}", abs / 100, abs % 100, self.currency)
    }
}
