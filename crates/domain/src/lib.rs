//! Checkout rules for the storefront.
//!
//! This crate turns a shopping cart into a price-snapshotted order:
//! - [`CartService`] for cart mutations and priced cart views
//! - the [`pricing`] evaluator (offer prices, coupon discounts, rounding)
//! - [`CouponValidator`] for coupon usage rules
//! - [`CheckoutService`] for quoting and placing orders

pub mod address;
pub mod cart;
pub mod checkout;
pub mod coupon;
pub mod error;
pub mod pricing;

pub use address::{DEFAULT_MIN_ADDRESS_LEN, ShippingAddress};
pub use cart::{AddToCart, CartService, CartView, CouponOutcome};
pub use checkout::{CheckoutConfig, CheckoutService, PlacedOrder, Quote, generate_order_number};
pub use coupon::{CouponError, CouponRejection, CouponValidator, check_coupon};
pub use error::{CheckoutError, require_user};
pub use pricing::{
    AmountOverflow, PriceBreakdown, PricedLine, discount_for, effective_unit_price, evaluate,
};
