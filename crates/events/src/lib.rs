//! Wire contracts for the fulfillment saga.
//!
//! Every event is a protobuf-tagged record encoded with `prost`. The
//! [`Event`] trait ties a record to its topic and gives consumers a single
//! decode-and-validate step at the boundary.

pub mod error;
pub mod event;
pub mod topics;
pub mod wire;

pub use error::CodecError;
pub use event::Event;
pub use wire::{
    OrderCreated, OrderLine, PaymentProcessed, StockReservationFailed, StockReserved, now_rfc3339,
};
