//! Manual payment confirmation for storefront orders.
//!
//! Payment happens outside the system: the shopper pays through a UPI app
//! and enters the transaction reference. This crate provides:
//! 1. The confirmation state machine ([`PaymentState`], [`PaymentSession`])
//! 2. The hand-off to the operator (UPI link, WhatsApp message)
//! 3. [`PaymentCoordinator`] driving sessions and attesting orders
//! 4. [`CartRelease`] and the [`StaleOrderSweeper`]

pub mod coordinator;
pub mod error;
pub mod handoff;
pub mod release;
pub mod session;
pub mod state;
pub mod sweeper;

pub use coordinator::{
    DEFAULT_SETTLING, PaymentConfig, PaymentCoordinator, PaymentProgress, PaymentPrompt,
};
pub use error::PaymentError;
pub use handoff::{Handoff, MerchantConfig, build_handoff, operator_message, upi_link};
pub use release::CartRelease;
pub use session::{PaymentSession, normalize_reference};
pub use state::PaymentState;
pub use sweeper::{DEFAULT_STALE_AFTER, StaleOrderSweeper};
