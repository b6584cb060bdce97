//! Shared primitive types used across the pipeline and the scenario engine.

/// Identifier of a seller. The join key of every derived table.
pub type SellerId = String;

/// Identifier of an order. Line items and reviews join on it.
pub type OrderId = String;

/// Sequence number of a computed seller table.
pub type GenerationId = u64;

/// Names of the four raw record sets, as reported in structural errors.
pub const SELLERS_TABLE: &str = "sellers";
pub const ORDER_ITEMS_TABLE: &str = "order_items";
pub const ORDERS_TABLE: &str = "orders";
pub const REVIEWS_TABLE: &str = "order_reviews";
