//! Shared types for the storefront workspace.
//!
//! Identifiers are UUID newtypes so that a user id can never be passed
//! where an order id is expected. Monetary amounts are integer paise.

pub mod ids;
pub mod money;

pub use ids::{OrderId, OrderItemId, ProductId, UserId};
pub use money::{InvalidQuantity, MAX_QUANTITY, Money, Quantity};
