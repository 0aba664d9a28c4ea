//! Shared types for the fulfillment services.

mod money;
mod types;

pub use money::{DEFAULT_CURRENCY, Money, MoneyError};
pub use types::{OrderId, PaymentId, ProductId, UserId};
