//! Turns a cart into an order.
//!
//! Each checkout re-reads the cart joined with the current product rows,
//! so the prices written into the order are the prices at submission
//! time. The order and every item are stored in one store transaction.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{OrderId, OrderItemId, UserId};
use rand::Rng;
use serde::Serialize;
use store::{Coupon, NewOrder, Order, OrderItem, StorefrontStore};

use crate::address::{DEFAULT_MIN_ADDRESS_LEN, ShippingAddress};
use crate::cart::price_lines;
use crate::coupon::CouponValidator;
use crate::error::{CheckoutError, require_user};
use crate::pricing::{self, PriceBreakdown, PricedLine};

/// Tunables for checkout.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Minimum trimmed length of a shipping address.
    pub min_address_len: usize,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            min_address_len: DEFAULT_MIN_ADDRESS_LEN,
        }
    }
}

/// An order as created, with its item snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// What the cart would cost if submitted now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub lines: Vec<PricedLine>,
    pub pricing: PriceBreakdown,
    pub coupon_code: Option<String>,
}

/// Builds a human-readable order number: `ORD-<UTC yyyymmddHHMMSS>-<4 digits>`.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("ORD-{}-{suffix:04}", now.format("%Y%m%d%H%M%S"))
}

/// Users with a checkout currently running.
#[derive(Debug, Default)]
struct InFlight {
    users: Mutex<HashSet<UserId>>,
}

impl InFlight {
    fn try_acquire(&self, user_id: UserId) -> Option<InFlightGuard<'_>> {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        users.insert(user_id).then_some(InFlightGuard {
            users: &self.users,
            user_id,
        })
    }
}

/// Releases the user's in-flight slot on drop.
struct InFlightGuard<'a> {
    users: &'a Mutex<HashSet<UserId>>,
    user_id: UserId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.user_id);
    }
}

/// Service for quoting and placing orders.
#[derive(Clone)]
pub struct CheckoutService<S> {
    store: S,
    coupons: CouponValidator<S>,
    config: CheckoutConfig,
    in_flight: Arc<InFlight>,
}

impl<S: StorefrontStore + Clone> CheckoutService<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, CheckoutConfig::default())
    }

    pub fn with_config(store: S, config: CheckoutConfig) -> Self {
        Self {
            coupons: CouponValidator::new(store.clone()),
            store,
            config,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Prices the current cart without writing anything.
    #[tracing::instrument(skip(self))]
    pub async fn quote(
        &self,
        user: Option<UserId>,
        coupon_code: Option<&str>,
    ) -> Result<Quote, CheckoutError> {
        let user_id = require_user(user)?;
        let (lines, pricing, coupon) = self.price_cart(user_id, coupon_code).await?;

        Ok(Quote {
            lines,
            pricing,
            coupon_code: coupon.map(|c| c.code),
        })
    }

    /// Converts the user's cart into a pending order.
    ///
    /// The cart itself is left untouched; it is released once payment is
    /// attested.
    #[tracing::instrument(skip(self, shipping_address))]
    pub async fn create_order(
        &self,
        user: Option<UserId>,
        shipping_address: &str,
        coupon_code: Option<&str>,
    ) -> Result<PlacedOrder, CheckoutError> {
        let started = Instant::now();
        let user_id = require_user(user)?;
        let address = ShippingAddress::parse(shipping_address, self.config.min_address_len)?;

        let _guard = self.in_flight.try_acquire(user_id).ok_or_else(|| {
            tracing::warn!(%user_id, "duplicate checkout submission rejected");
            CheckoutError::CheckoutInProgress
        })?;

        let (lines, pricing, coupon) = self.price_cart(user_id, coupon_code).await?;

        let order_id = OrderId::new();
        let now = Utc::now();

        let items: Vec<OrderItem> = lines
            .into_iter()
            .map(|line| OrderItem {
                id: OrderItemId::new(),
                order_id,
                product_id: line.product_id,
                product_name: line.product_name,
                quantity: line.quantity,
                price_per_unit: line.unit_price,
                total_price: line.line_total,
                variant: line.variant,
                measurement: line.measurement,
            })
            .collect();

        let new_order = NewOrder {
            id: order_id,
            order_number: generate_order_number(now),
            user_id,
            total_amount: pricing.subtotal,
            discount_amount: pricing.discount,
            final_amount: pricing.final_amount,
            coupon_code: coupon.map(|c| c.code),
            shipping_address: address.into_inner(),
            created_at: now,
        };

        let order = self.store.create_order(new_order, items.clone()).await?;

        metrics::counter!("checkout_orders_created_total").increment(1);
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            %order_id,
            order_number = %order.order_number,
            final_amount = %order.final_amount,
            items = items.len(),
            "order created"
        );

        Ok(PlacedOrder { order, items })
    }

    /// Reads the cart against current product rows and prices it.
    async fn price_cart(
        &self,
        user_id: UserId,
        coupon_code: Option<&str>,
    ) -> Result<(Vec<PricedLine>, PriceBreakdown, Option<Coupon>), CheckoutError> {
        let cart = self.store.get_cart(user_id).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let (lines, unavailable) = price_lines(cart)?;
        if let Some(product_id) = unavailable.first() {
            return Err(CheckoutError::ProductUnavailable(*product_id));
        }

        let coupon = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(
                self.coupons
                    .validate(code, pricing::subtotal(&lines)?)
                    .await?,
            ),
            None => None,
        };

        let pricing = pricing::evaluate(&lines, coupon.as_ref())?;
        Ok((lines, pricing, coupon))
    }
}
