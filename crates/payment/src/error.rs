//! Payment error types.

use std::time::Duration;

use common::OrderId;
use store::{OrderStatus, PaymentStatus, StoreError};
use thiserror::Error;

use crate::state::PaymentState;

/// Errors that can occur while confirming a payment.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// No authenticated user was supplied.
    #[error("Authentication required")]
    AuthRequired,

    /// The order does not exist or belongs to someone else.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order is past the point where payment can start.
    #[error("Order cannot take payment: status {status}, payment status {payment_status}")]
    OrderNotPayable {
        status: OrderStatus,
        payment_status: PaymentStatus,
    },

    /// The order was abandoned by the stale order sweep.
    #[error("Order {0} has been abandoned")]
    OrderAbandoned(OrderId),

    /// The transaction reference was blank.
    #[error("Transaction reference must not be empty")]
    EmptyReference,

    /// The session is in the wrong state for the requested operation.
    #[error("Invalid payment state: expected {expected}, actual {actual}")]
    InvalidState {
        expected: PaymentState,
        actual: PaymentState,
    },

    /// Completion was requested before the settling cooldown ran out.
    #[error("Payment is still settling, retry in {:.1}s", .remaining.as_secs_f64())]
    SettlingNotElapsed { remaining: Duration },

    /// The persisted payment status changed underneath the request.
    #[error("Payment status conflict: expected {expected}, found {actual}")]
    PaymentStatusConflict {
        expected: PaymentStatus,
        actual: PaymentStatus,
    },

    /// A deep link could not be built from the merchant settings.
    #[error("Invalid payment link: {0}")]
    InvalidLink(#[from] url::ParseError),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for PaymentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OrderAbandoned(order_id) => PaymentError::OrderAbandoned(order_id),
            StoreError::PaymentStatusConflict {
                expected, actual, ..
            } => PaymentError::PaymentStatusConflict { expected, actual },
            other => PaymentError::Store(other),
        }
    }
}

/// Convenience type alias for payment results.
pub type Result<T> = std::result::Result<T, PaymentError>;
