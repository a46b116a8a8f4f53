//! Storage layer for the storefront.
//!
//! [`StorefrontStore`] is the query-and-mutate interface the checkout core
//! depends on. [`PostgresStore`] is the production backend and
//! [`InMemoryStore`] backs tests and local runs.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::OrderQuery;
pub use records::{
    CartItem, CartLine, Coupon, CouponDiscount, MeasurementConfig, MeasurementSelection, NewOrder,
    Order, OrderItem, OrderStatus, PaymentStatus, PaymentUpdate, Product, VariantConfig,
    VariantOption, VariantSelection,
};
pub use store::{StorefrontStore, StorefrontStoreExt, validate_order_for_insert};
