//! Saga error types.

use domain::{DomainError, ProductId};
use store::StoreError;
use thiserror::Error;

/// Why a checkout did not produce an order.
///
/// Every variant except [`SagaError::EmptyCart`] and
/// [`SagaError::InvalidInput`] is returned only after held stock has been
/// released.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Shipping address or payment method is missing.
    #[error("Invalid checkout input: {0}")]
    InvalidInput(#[from] DomainError),

    /// A cart line references a product the catalog does not know.
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: ProductId },

    /// Fewer units remain than the cart line asks for.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The backing store failed.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),

    /// The checkout deadline elapsed while a step was in flight.
    #[error("Checkout deadline exceeded during {step}")]
    DeadlineExceeded { step: &'static str },
}

impl SagaError {
    /// Returns true if the same checkout may succeed when tried again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SagaError::PersistenceFailure(_) | SagaError::DeadlineExceeded { .. }
        )
    }

    /// Short label used for the `reason` metric dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            SagaError::EmptyCart => "empty_cart",
            SagaError::InvalidInput(_) => "invalid_input",
            SagaError::ProductNotFound { .. } => "product_not_found",
            SagaError::InsufficientStock { .. } => "insufficient_stock",
            SagaError::PersistenceFailure(_) => "persistence_failure",
            SagaError::DeadlineExceeded { .. } => "deadline_exceeded",
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(!SagaError::EmptyCart.is_retryable());
        assert!(
            !SagaError::ProductNotFound {
                product_id: "SKU-1".into()
            }
            .is_retryable()
        );
        assert!(
            !SagaError::InsufficientStock {
                product_id: "SKU-1".into(),
                requested: 2,
                available: 1,
            }
            .is_retryable()
        );
        assert!(SagaError::PersistenceFailure(StoreError::Unavailable("down".into())).is_retryable());
        assert!(SagaError::DeadlineExceeded { step: "reserve_stock" }.is_retryable());
    }

    #[test]
    fn test_messages() {
        let err = SagaError::InsufficientStock {
            product_id: "SKU-1".into(),
            requested: 3,
            available: 1,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for SKU-1: requested 3, available 1"
        );
        assert_eq!(err.reason(), "insufficient_stock");
    }
}
