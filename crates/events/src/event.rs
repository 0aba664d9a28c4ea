//! The [`Event`] trait binding each wire record to its topic.

use prost::Message;

use crate::error::CodecError;
use crate::topics;
use crate::wire::{OrderCreated, PaymentProcessed, StockReservationFailed, StockReserved};

/// A domain event that travels over the broker.
///
/// Each event type is published to exactly one topic, so a consumer decodes
/// a payload as the event type registered for the topic it subscribed to.
pub trait Event: Message + Default + Clone + Send + Sync + 'static {
    /// Human-readable event name used in logs and errors.
    const NAME: &'static str;

    /// Topic the event is published to.
    const TOPIC: &'static str;

    /// Broker partitioning key. Events for one order share a partition.
    fn partition_key(&self) -> &str;

    /// Checks fields every consumer relies on.
    fn validate(&self) -> Result<(), CodecError>;

    /// Encodes the event to its binary wire form.
    fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decodes and validates a binary payload.
    fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let event = Self::decode(bytes).map_err(|source| CodecError::Decode {
            event: Self::NAME,
            source,
        })?;
        event.validate()?;
        Ok(event)
    }
}

fn require(event: &'static str, field: &'static str, value: &str) -> Result<(), CodecError> {
    if value.is_empty() {
        return Err(CodecError::MissingField { event, field });
    }
    Ok(())
}

impl Event for OrderCreated {
    const NAME: &'static str = "OrderCreated";
    const TOPIC: &'static str = topics::ORDER_CREATED;

    fn partition_key(&self) -> &str {
        &self.order_id
    }

    fn validate(&self) -> Result<(), CodecError> {
        require(Self::NAME, "order_id", &self.order_id)?;
        require(Self::NAME, "user_id", &self.user_id)?;
        for line in &self.items {
            require(Self::NAME, "items.product_id", &line.product_id)?;
        }
        Ok(())
    }
}

impl Event for StockReserved {
    const NAME: &'static str = "StockReserved";
    const TOPIC: &'static str = topics::STOCK_RESERVED;

    fn partition_key(&self) -> &str {
        &self.order_id
    }

    fn validate(&self) -> Result<(), CodecError> {
        require(Self::NAME, "order_id", &self.order_id)
    }
}

impl Event for StockReservationFailed {
    const NAME: &'static str = "StockReservationFailed";
    const TOPIC: &'static str = topics::STOCK_RESERVATION_FAILED;

    fn partition_key(&self) -> &str {
        &self.order_id
    }

    fn validate(&self) -> Result<(), CodecError> {
        require(Self::NAME, "order_id", &self.order_id)
    }
}

impl Event for PaymentProcessed {
    const NAME: &'static str = "PaymentProcessed";
    const TOPIC: &'static str = topics::PAYMENT_PROCESSED;

    fn partition_key(&self) -> &str {
        &self.order_id
    }

    fn validate(&self) -> Result<(), CodecError> {
        require(Self::NAME, "order_id", &self.order_id)
    }
}
