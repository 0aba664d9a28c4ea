//! Protobuf-tagged wire records.
//!
//! Field tags are part of the contract: never renumber or reuse a tag, only
//! append new ones, so older consumers keep decoding newer payloads.

use chrono::{SecondsFormat, Utc};
use common::{Money, OrderId, PaymentId, ProductId, UserId};

/// Current time formatted the way every event carries it.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// One line of an [`OrderCreated`] event.
#[derive(Clone, PartialEq, prost::Message)]
pub struct OrderLine {
    #[prost(string, tag = "1")]
    pub product_id: String,
    #[prost(int32, tag = "2")]
    pub quantity: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OrderCreated {
    #[prost(string, tag = "1")]
    pub order_id: String,
    #[prost(string, tag = "2")]
    pub user_id: String,
    #[prost(message, repeated, tag = "3")]
    pub items: Vec<OrderLine>,
    #[prost(int64, tag = "4")]
    pub total_amount: i64,
    #[prost(string, tag = "5")]
    pub currency: String,
    #[prost(string, tag = "6")]
    pub occurred_at: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StockReserved {
    #[prost(string, tag = "1")]
    pub order_id: String,
    #[prost(string, tag = "2")]
    pub user_id: String,
    #[prost(string, tag = "3")]
    pub occurred_at: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StockReservationFailed {
    #[prost(string, tag = "1")]
    pub order_id: String,
    #[prost(string, tag = "2")]
    pub user_id: String,
    #[prost(string, tag = "3")]
    pub reason: String,
    #[prost(string, tag = "4")]
    pub occurred_at: String,
    #[prost(string, repeated, tag = "5")]
    pub failed_products: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PaymentProcessed {
    #[prost(string, tag = "1")]
    pub order_id: String,
    #[prost(string, tag = "2")]
    pub payment_id: String,
    #[prost(bool, tag = "3")]
    pub success: bool,
    #[prost(string, tag = "4")]
    pub message: String,
    #[prost(int64, tag = "5")]
    pub amount: i64,
    #[prost(string, tag = "6")]
    pub currency: String,
    #[prost(string, tag = "7")]
    pub occurred_at: String,
}

impl OrderLine {
    pub fn new(product_id: &ProductId, quantity: u32) -> Self {
        Self {
            product_id: product_id.to_string(),
            quantity: i32::try_from(quantity).unwrap_or(i32::MAX),
        }
    }
}

impl OrderCreated {
    pub fn new(order_id: &OrderId, user_id: &UserId, items: Vec<OrderLine>, total: &Money) -> Self {
        Self {
            order_id: order_id.to_string(),
            user_id: user_id.to_string(),
            items,
            total_amount: total.amount(),
            currency: total.currency().to_string(),
            occurred_at: now_rfc3339(),
        }
    }
}

impl StockReserved {
    pub fn new(order_id: &OrderId, user_id: &UserId) -> Self {
        Self {
            order_id: order_id.to_string(),
            user_id: user_id.to_string(),
            occurred_at: now_rfc3339(),
        }
    }
}

impl StockReservationFailed {
    pub fn new(
        order_id: &OrderId,
        user_id: &UserId,
        reason: impl Into<String>,
        failed_products: &[ProductId],
    ) -> Self {
        Self {
            order_id: order_id.to_string(),
            user_id: user_id.to_string(),
            reason: reason.into(),
            occurred_at: now_rfc3339(),
            failed_products: failed_products.iter().map(ToString::to_string).collect(),
        }
    }
}

impl PaymentProcessed {
    pub fn new(
        order_id: &OrderId,
        payment_id: &PaymentId,
        success: bool,
        message: impl Into<String>,
        amount: &Money,
    ) -> Self {
        Self {
            order_id: order_id.to_string(),
            payment_id: payment_id.to_string(),
            success,
            message: message.into(),
            amount: amount.amount(),
            currency: amount.currency().to_string(),
            occurred_at: now_rfc3339(),
        }
    }
}
