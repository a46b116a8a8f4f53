//! Coupon validation endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::Money;
use domain::discount_for;
use serde::{Deserialize, Serialize};
use store::{CouponDiscount, StorefrontStore};

use super::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    /// Subtotal in paise the coupon would apply to.
    pub subtotal_paise: i64,
}

#[derive(Serialize)]
pub struct ValidCouponResponse {
    pub code: String,
    pub discount_type: &'static str,
    pub terms: CouponDiscount,
    pub discount: Money,
    pub final_amount: Money,
}

/// POST /coupons/validate: checks a code against a subtotal.
///
/// A rejection is answered with 422 and a machine-readable `reason`.
#[tracing::instrument(skip(state))]
pub async fn validate<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ValidateCouponRequest>,
) -> Result<Json<ValidCouponResponse>, ApiError> {
    if req.subtotal_paise < 0 {
        return Err(ApiError::BadRequest(
            "subtotal_paise must not be negative".to_string(),
        ));
    }
    let subtotal = Money::from_paise(req.subtotal_paise);

    let coupon = state.coupons.validate(&req.code, subtotal).await?;
    let discount = discount_for(&coupon.discount, subtotal);
    let final_amount = subtotal
        .checked_sub(discount)
        .ok_or_else(|| ApiError::BadRequest("subtotal_paise is out of range".to_string()))?;

    Ok(Json(ValidCouponResponse {
        discount_type: coupon.discount.type_name(),
        terms: coupon.discount,
        code: coupon.code,
        discount,
        final_amount,
    }))
}
