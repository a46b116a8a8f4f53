use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use tokio::sync::RwLock;

use crate::{
    CartItem, CartLine, Coupon, NewOrder, Order, OrderItem, OrderQuery, OrderStatus,
    PaymentStatus, PaymentUpdate, Product, Result, StoreError,
    store::{StorefrontStore, validate_order_for_insert},
};

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    /// Keyed by lower-cased code.
    coupons: HashMap<String, Coupon>,
    cart: HashMap<(UserId, ProductId), CartItem>,
    orders: HashMap<OrderId, Order>,
    order_items: HashMap<OrderId, Vec<OrderItem>>,
    fail_on_order_items: bool,
}

/// In-memory store implementation for tests and local runs.
///
/// Provides the same interface and the same atomicity guarantees as the
/// PostgreSQL implementation: every write happens under one lock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next order-item inserts fail, simulating a write failure
    /// after the order row was accepted.
    pub async fn set_fail_on_order_items(&self, fail: bool) {
        self.state.write().await.fail_on_order_items = fail;
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the total number of order items stored.
    pub async fn order_item_count(&self) -> usize {
        self.state.read().await.order_items.values().map(Vec::len).sum()
    }

    /// Overrides an order's creation time. Used to age orders in tests.
    pub async fn backdate_order(&self, order_id: OrderId, created_at: DateTime<Utc>) {
        if let Some(order) = self.state.write().await.orders.get_mut(&order_id) {
            order.created_at = created_at;
        }
    }
}

#[async_trait]
impl StorefrontStore for InMemoryStore {
    async fn put_product(&self, product: Product) -> Result<()> {
        self.state.write().await.products.insert(product.id, product);
        Ok(())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&product_id).cloned())
    }

    async fn put_coupon(&self, coupon: Coupon) -> Result<()> {
        let key = coupon.code.to_lowercase();
        self.state.write().await.coupons.insert(key, coupon);
        Ok(())
    }

    async fn find_active_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        let state = self.state.read().await;
        Ok(state
            .coupons
            .get(&code.to_lowercase())
            .filter(|c| c.is_active)
            .cloned())
    }

    async fn upsert_cart_item(&self, mut item: CartItem) -> Result<CartItem> {
        let mut state = self.state.write().await;

        // Same foreign key the cart_items table carries
        if !state.products.contains_key(&item.product_id) {
            return Err(StoreError::NotFound {
                entity: "product",
                id: item.product_id.to_string(),
            });
        }

        let key = (item.user_id, item.product_id);
        if let Some(existing) = state.cart.get(&key) {
            item.added_at = existing.added_at;
        }
        state.cart.insert(key, item.clone());
        Ok(item)
    }

    async fn remove_cart_item(&self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state.cart.remove(&(user_id, product_id)).is_some())
    }

    async fn get_cart(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let state = self.state.read().await;
        let mut lines: Vec<CartLine> = state
            .cart
            .values()
            .filter(|item| item.user_id == user_id)
            .map(|item| CartLine {
                item: item.clone(),
                product: state.products.get(&item.product_id).cloned(),
            })
            .collect();
        lines.sort_by(|a, b| {
            a.item
                .added_at
                .cmp(&b.item.added_at)
                .then(a.item.product_id.cmp(&b.item.product_id))
        });
        Ok(lines)
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.cart.len();
        state.cart.retain(|(owner, _), _| *owner != user_id);
        Ok((before - state.cart.len()) as u64)
    }

    async fn create_order(&self, order: NewOrder, items: Vec<OrderItem>) -> Result<Order> {
        validate_order_for_insert(&order, &items)?;

        let mut state = self.state.write().await;

        if state.orders.contains_key(&order.id) {
            return Err(StoreError::UniqueViolation {
                constraint: "orders_pkey".to_string(),
            });
        }
        if state
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(StoreError::UniqueViolation {
                constraint: "orders_order_number_key".to_string(),
            });
        }

        // Checked before anything is written so a failure leaves no order row
        if state.fail_on_order_items {
            return Err(StoreError::InvalidOrder(
                "simulated order item insert failure".to_string(),
            ));
        }

        let order = order.into_order();
        state.order_items.insert(order.id, items);
        state.orders.insert(order.id, order.clone());

        Ok(order)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&order_id).cloned())
    }

    async fn get_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        Ok(self
            .state
            .read()
            .await
            .order_items
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();

        // Newest first
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let offset = query.offset.unwrap_or(0);
        let orders = orders.into_iter().skip(offset);
        let orders = match query.limit {
            Some(limit) => orders.take(limit).collect(),
            None => orders.collect(),
        };

        Ok(orders)
    }

    async fn update_payment(&self, order_id: OrderId, update: PaymentUpdate) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })?;

        if order.status == OrderStatus::Abandoned {
            return Err(StoreError::OrderAbandoned(order_id));
        }
        if order.payment_status != update.expected {
            return Err(StoreError::PaymentStatusConflict {
                order_id,
                expected: update.expected,
                actual: order.payment_status,
            });
        }

        order.payment_status = update.payment_status;
        if let Some(status) = update.order_status {
            order.status = status;
        }
        if let Some(reference) = update.reference {
            order.payment_reference = Some(reference);
        }
        order.updated_at = Utc::now();

        Ok(order.clone())
    }

    async fn abandon_stale_orders(&self, created_before: DateTime<Utc>) -> Result<Vec<OrderId>> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut abandoned = Vec::new();

        for order in state.orders.values_mut() {
            if order.status == OrderStatus::Pending
                && order.payment_status == PaymentStatus::Pending
                && order.created_at < created_before
            {
                order.status = OrderStatus::Abandoned;
                order.updated_at = now;
                abandoned.push(order.id);
            }
        }

        Ok(abandoned)
    }
}
