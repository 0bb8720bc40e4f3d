use domain::DomainError;
use thiserror::Error;

/// Name of the unique constraint on `orders.order_number`.
pub const ORDER_NUMBER_CONSTRAINT: &str = "orders_order_number_key";

/// Errors that can occur when talking to the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A unique constraint rejected the write.
    #[error("Unique constraint violated: {constraint}")]
    Conflict { constraint: String },

    /// A domain rule rejected the change.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// The backend is unreachable or refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back into the domain.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if this is a duplicate order number.
    pub fn is_order_number_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { constraint } if constraint == ORDER_NUMBER_CONSTRAINT)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
