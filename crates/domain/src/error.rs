//! Domain error types.

use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised when a domain rule is violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Quantities on cart and order lines must be at least one.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Prices must not be negative.
    #[error("Invalid price: {cents} cents (must not be negative)")]
    InvalidPrice { cents: i64 },

    /// The cart has no line for the product.
    #[error("Item not found in cart: {product_id}")]
    ItemNotFound { product_id: String },

    /// The requested fulfillment transition is not allowed.
    #[error("Invalid status transition: cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// A required checkout field was blank.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
