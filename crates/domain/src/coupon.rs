//! Coupon validation.

use chrono::{DateTime, Utc};
use common::Money;
use serde::Serialize;
use store::{Coupon, StoreError, StorefrontStore};
use thiserror::Error;

/// Why a coupon cannot be applied to a subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CouponRejection {
    #[error("coupon code is not valid")]
    InvalidCode,

    #[error("order subtotal is below the coupon minimum of {min_order_amount}")]
    BelowMinimum { min_order_amount: Money },

    #[error("coupon has expired")]
    Expired,
}

impl CouponRejection {
    /// Stable machine-readable reason, also used as a metric label.
    pub fn code(&self) -> &'static str {
        match self {
            CouponRejection::InvalidCode => "invalid_code",
            CouponRejection::BelowMinimum { .. } => "below_minimum",
            CouponRejection::Expired => "expired",
        }
    }
}

/// Failure of a coupon lookup: a business rejection or a store fault.
#[derive(Debug, Error)]
pub enum CouponError {
    #[error(transparent)]
    Rejected(#[from] CouponRejection),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Applies the usage rules to a looked-up coupon.
///
/// Checks short-circuit in this order: existence, minimum order amount,
/// expiry.
pub fn check_coupon(
    coupon: Option<Coupon>,
    subtotal: Money,
    now: DateTime<Utc>,
) -> Result<Coupon, CouponRejection> {
    let coupon = match coupon {
        Some(c) if c.is_active => c,
        _ => return Err(CouponRejection::InvalidCode),
    };

    if let Some(min_order_amount) = coupon.min_order_amount
        && subtotal < min_order_amount
    {
        return Err(CouponRejection::BelowMinimum { min_order_amount });
    }

    if let Some(valid_until) = coupon.valid_until
        && now > valid_until
    {
        return Err(CouponRejection::Expired);
    }

    Ok(coupon)
}

/// Resolves coupon codes against the store.
#[derive(Clone)]
pub struct CouponValidator<S> {
    store: S,
}

impl<S: StorefrontStore> CouponValidator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validates `code` against `subtotal` at the current time.
    pub async fn validate(&self, code: &str, subtotal: Money) -> Result<Coupon, CouponError> {
        self.validate_at(code, subtotal, Utc::now()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn validate_at(
        &self,
        code: &str,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<Coupon, CouponError> {
        let code = code.trim();
        let coupon = if code.is_empty() {
            None
        } else {
            self.store.find_active_coupon(code).await?
        };

        check_coupon(coupon, subtotal, now).map_err(|reason| {
            tracing::info!(reason = reason.code(), "coupon rejected");
            metrics::counter!("coupon_rejections_total", "reason" => reason.code()).increment(1);
            CouponError::Rejected(reason)
        })
    }
}
