//! Logical topic names shared by producers and consumers.

/// Published by the order service when an order is persisted.
pub const ORDER_CREATED: &str = "orders.v1.order_created";

/// Published by the inventory service after a fully successful reservation.
pub const STOCK_RESERVED: &str = "inventory.v1.stock_reserved";

/// Published by the inventory service when any item could not be reserved.
pub const STOCK_RESERVATION_FAILED: &str = "inventory.v1.stock_reservation_failed";

/// Published by the payment service for both approvals and business declines.
pub const PAYMENT_PROCESSED: &str = "payments.v1.payment_processed";

/// Every topic the platform uses.
pub const ALL: [&str; 4] = [
    ORDER_CREATED,
    STOCK_RESERVED,
    STOCK_RESERVATION_FAILED,
    PAYMENT_PROCESSED,
];
