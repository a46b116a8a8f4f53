use common::OrderId;
use thiserror::Error;

use crate::records::PaymentStatus;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A unique constraint rejected the write.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A compare-and-set payment update found a different status.
    #[error(
        "Payment status conflict for order {order_id}: expected {expected}, found {actual}"
    )]
    PaymentStatusConflict {
        order_id: OrderId,
        expected: PaymentStatus,
        actual: PaymentStatus,
    },

    /// The order was abandoned and no longer accepts payment updates.
    #[error("Order {0} has been abandoned")]
    OrderAbandoned(OrderId),

    /// An order and its items failed the insert checks.
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// A stored row could not be decoded into a record.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
