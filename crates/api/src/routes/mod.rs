//! HTTP handlers and the state they share.

pub mod admin;
pub mod cart;
pub mod coupons;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payment;

use std::str::FromStr;

use domain::{CartService, CheckoutService, CouponValidator};
use ::payment::{PaymentCoordinator, StaleOrderSweeper};
use store::StorefrontStore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: StorefrontStore> {
    pub store: S,
    pub cart: CartService<S>,
    pub checkout: CheckoutService<S>,
    pub coupons: CouponValidator<S>,
    pub payments: PaymentCoordinator<S>,
    pub sweeper: StaleOrderSweeper<S>,
    pub admin_token: Option<String>,
}

fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what} format: {e}")))
}

/// Treats a blank coupon code as no coupon.
fn coupon_code(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|code| !code.is_empty())
}
