//! Domain error types.

use common::{ProductId, UserId};
use store::StoreError;
use thiserror::Error;

use crate::coupon::{CouponError, CouponRejection};
use crate::pricing::AmountOverflow;

/// Errors that can occur during cart and checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No authenticated user was supplied.
    #[error("Authentication required")]
    AuthRequired,

    /// Input failed validation.
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Checkout was attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// A product is missing or no longer sold.
    #[error("Product {0} is unavailable")]
    ProductUnavailable(ProductId),

    /// The supplied coupon cannot be applied.
    #[error("Coupon rejected: {0}")]
    CouponRejected(CouponRejection),

    /// Cart totals do not fit in the supported money range.
    #[error("Cart total is too large: {0}")]
    AmountOutOfRange(#[from] AmountOverflow),

    /// Another checkout for the same user has not finished yet.
    #[error("A checkout is already in progress for this user")]
    CheckoutInProgress,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CheckoutError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CheckoutError::Validation {
            field,
            message: message.into(),
        }
    }
}

/// Unwraps the caller identity or fails with `AuthRequired`.
pub fn require_user(user: Option<UserId>) -> Result<UserId, CheckoutError> {
    user.ok_or(CheckoutError::AuthRequired)
}

impl From<CouponError> for CheckoutError {
    fn from(err: CouponError) -> Self {
        match err {
            CouponError::Rejected(reason) => CheckoutError::CouponRejected(reason),
            CouponError::Store(err) => CheckoutError::Store(err),
        }
    }
}
