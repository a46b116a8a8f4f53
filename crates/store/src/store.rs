use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};

use crate::{
    CartItem, CartLine, Coupon, NewOrder, Order, OrderItem, OrderQuery, PaymentUpdate, Product,
    Result, StoreError,
};

/// Query-and-mutate interface over the storefront's relational tables.
///
/// All implementations must be thread-safe (Send + Sync). Rows are
/// partitioned by user; callers are responsible for ownership checks.
#[async_trait]
pub trait StorefrontStore: Send + Sync {
    /// Inserts or replaces a product.
    async fn put_product(&self, product: Product) -> Result<()>;

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Inserts or replaces a coupon, keyed by its case-insensitive code.
    async fn put_coupon(&self, coupon: Coupon) -> Result<()>;

    /// Finds an active coupon whose code equals `code` ignoring case.
    async fn find_active_coupon(&self, code: &str) -> Result<Option<Coupon>>;

    /// Inserts a cart line or replaces the existing line for the same
    /// (user, product) pair. The original `added_at` is kept on replace.
    async fn upsert_cart_item(&self, item: CartItem) -> Result<CartItem>;

    /// Deletes one cart line. Returns false if there was nothing to delete.
    async fn remove_cart_item(&self, user_id: UserId, product_id: ProductId) -> Result<bool>;

    /// Returns the user's cart lines joined with the current product rows,
    /// oldest line first.
    async fn get_cart(&self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Deletes every cart line of the user. Returns the number removed.
    async fn clear_cart(&self, user_id: UserId) -> Result<u64>;

    /// Inserts an order and all of its items atomically - either the order
    /// and every item are stored, or nothing is.
    async fn create_order(&self, order: NewOrder, items: Vec<OrderItem>) -> Result<Order>;

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Returns the items of an order in insertion order.
    async fn get_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<Order>>;

    /// Applies a compare-and-set payment update.
    ///
    /// Fails with `PaymentStatusConflict` if the current payment status is
    /// not `update.expected`, and with `OrderAbandoned` for abandoned orders.
    async fn update_payment(&self, order_id: OrderId, update: PaymentUpdate) -> Result<Order>;

    /// Marks every pending, unpaid order created before `created_before` as
    /// abandoned. Returns the affected order ids.
    async fn abandon_stale_orders(&self, created_before: DateTime<Utc>) -> Result<Vec<OrderId>>;
}

/// Extension trait providing convenience methods for stores.
#[async_trait]
pub trait StorefrontStoreExt: StorefrontStore {
    /// Returns true if the user has no cart lines.
    async fn cart_is_empty(&self, user_id: UserId) -> Result<bool> {
        Ok(self.get_cart(user_id).await?.is_empty())
    }

    /// Loads an order together with its items.
    async fn load_order_with_items(
        &self,
        order_id: OrderId,
    ) -> Result<Option<(Order, Vec<OrderItem>)>> {
        match self.get_order(order_id).await? {
            Some(order) => {
                let items = self.get_order_items(order_id).await?;
                Ok(Some((order, items)))
            }
            None => Ok(None),
        }
    }

    /// Loads an order, failing with `NotFound` if it does not exist.
    async fn require_order(&self, order_id: OrderId) -> Result<Order> {
        self.get_order(order_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })
    }
}

// Blanket implementation for all StorefrontStore implementations
impl<T: StorefrontStore + ?Sized> StorefrontStoreExt for T {}

/// Checks an order and its items before insertion.
///
/// Enforces what the table constraints enforce, so both backends reject the
/// same inputs: at least one item, items belong to the order, amounts add up
/// and the discount never exceeds the subtotal.
pub fn validate_order_for_insert(order: &NewOrder, items: &[OrderItem]) -> Result<()> {
    if items.is_empty() {
        return Err(StoreError::InvalidOrder(
            "an order needs at least one item".to_string(),
        ));
    }

    for item in items {
        if item.order_id != order.id {
            return Err(StoreError::InvalidOrder(format!(
                "item {} belongs to order {}, not {}",
                item.id, item.order_id, order.id
            )));
        }
        if item.price_per_unit.checked_times(item.quantity) != Some(item.total_price) {
            return Err(StoreError::InvalidOrder(format!(
                "item {} total {} does not match {} x {}",
                item.id, item.total_price, item.price_per_unit, item.quantity
            )));
        }
    }

    let items_total = Money::checked_sum(items.iter().map(|item| item.total_price))
        .ok_or_else(|| StoreError::InvalidOrder("item totals overflow".to_string()))?;
    if items_total != order.total_amount {
        return Err(StoreError::InvalidOrder(format!(
            "order total {} does not match item totals {}",
            order.total_amount, items_total
        )));
    }

    if order.discount_amount.is_negative() || order.discount_amount > order.total_amount {
        return Err(StoreError::InvalidOrder(format!(
            "discount {} outside [0, {}]",
            order.discount_amount, order.total_amount
        )));
    }

    if order.total_amount.checked_sub(order.discount_amount) != Some(order.final_amount) {
        return Err(StoreError::InvalidOrder(format!(
            "final amount {} is not {} - {}",
            order.final_amount, order.total_amount, order.discount_amount
        )));
    }

    if order.shipping_address.trim().is_empty() {
        return Err(StoreError::InvalidOrder(
            "shipping address is empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderItemId, Quantity};

    fn new_order(total: i64, discount: i64) -> NewOrder {
        NewOrder {
            id: OrderId::new(),
            order_number: "ORD-1".to_string(),
            user_id: UserId::new(),
            total_amount: Money::from_rupees(total),
            discount_amount: Money::from_rupees(discount),
            final_amount: Money::from_rupees(total - discount),
            coupon_code: None,
            shipping_address: "7 Lake View, Kochi".to_string(),
            created_at: Utc::now(),
        }
    }

    fn item_for(order: &NewOrder, price: i64, qty: u32) -> OrderItem {
        let quantity = Quantity::from_units(qty).unwrap();
        let price_per_unit = Money::from_rupees(price);
        OrderItem {
            id: OrderItemId::new(),
            order_id: order.id,
            product_id: ProductId::new(),
            product_name: "Tea".to_string(),
            quantity,
            price_per_unit,
            total_price: price_per_unit.checked_times(quantity).unwrap(),
            variant: None,
            measurement: None,
        }
    }

    #[test]
    fn accepts_consistent_order() {
        let order = new_order(1000, 100);
        let items = vec![item_for(&order, 500, 2)];
        assert!(validate_order_for_insert(&order, &items).is_ok());
    }

    #[test]
    fn rejects_item_totals_that_overflow() {
        let mut order = new_order(0, 0);
        let mut items = vec![item_for(&order, 1, 1), item_for(&order, 1, 1)];
        for item in &mut items {
            item.price_per_unit = Money::from_paise(i64::MAX);
            item.total_price = Money::from_paise(i64::MAX);
        }
        order.total_amount = Money::from_paise(i64::MAX);
        order.final_amount = Money::from_paise(i64::MAX);

        let err = validate_order_for_insert(&order, &items).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOrder(msg) if msg.contains("overflow")));
    }

    #[test]
    fn rejects_empty_items() {
        let order = new_order(1000, 0);
        assert!(matches!(
            validate_order_for_insert(&order, &[]),
            Err(StoreError::InvalidOrder(_))
        ));
    }

    #[test]
    fn rejects_foreign_items() {
        let order = new_order(1000, 0);
        let other = new_order(1000, 0);
        let items = vec![item_for(&other, 500, 2)];
        assert!(validate_order_for_insert(&order, &items).is_err());
    }

    #[test]
    fn rejects_discount_above_subtotal() {
        let mut order = new_order(150, 0);
        order.discount_amount = Money::from_rupees(200);
        order.final_amount = Money::from_rupees(-50);
        let items = vec![item_for(&order, 150, 1)];
        assert!(validate_order_for_insert(&order, &items).is_err());
    }

    #[test]
    fn rejects_wrong_final_amount() {
        let mut order = new_order(1000, 100);
        order.final_amount = Money::from_rupees(1000);
        let items = vec![item_for(&order, 500, 2)];
        assert!(validate_order_for_insert(&order, &items).is_err());
    }
}
