//! Periodic abandonment of stale unpaid orders.

use std::time::Duration;

use chrono::{DateTime, Utc};
use common::OrderId;
use store::{StoreError, StorefrontStore};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::coordinator::PaymentCoordinator;

/// Default age after which an unpaid order is abandoned.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(48 * 60 * 60);

/// Marks long-unpaid pending orders as abandoned.
#[derive(Clone)]
pub struct StaleOrderSweeper<S> {
    store: S,
    payments: PaymentCoordinator<S>,
    stale_after: chrono::Duration,
}

impl<S: StorefrontStore + Clone> StaleOrderSweeper<S> {
    pub fn new(store: S, payments: PaymentCoordinator<S>, stale_after: Duration) -> Self {
        Self {
            store,
            payments,
            stale_after: chrono::Duration::from_std(stale_after)
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Abandons every pending, unpaid order created before
    /// `now - stale_after` and drops its payment session.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<Vec<OrderId>, StoreError> {
        let cutoff = now
            .checked_sub_signed(self.stale_after)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let abandoned = self.store.abandon_stale_orders(cutoff).await?;

        self.payments.forget(&abandoned).await;

        if !abandoned.is_empty() {
            metrics::counter!("orders_abandoned_total").increment(abandoned.len() as u64);
            tracing::info!(count = abandoned.len(), %cutoff, "stale orders abandoned");
        }
        Ok(abandoned)
    }

    /// Sweeps every `interval` until `shutdown` turns true or its sender
    /// is dropped.
    pub async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = interval.as_secs(), "stale order sweeper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once(Utc::now()).await {
                        tracing::warn!(error = %e, "stale order sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("stale order sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::PaymentConfig;
    use common::{Money, OrderItemId, ProductId, Quantity, UserId};
    use store::{InMemoryStore, NewOrder, OrderItem, OrderStatus, PaymentUpdate};

    async fn seed(store: &InMemoryStore, age: chrono::Duration) -> OrderId {
        let order_id = OrderId::new();
        let created_at = Utc::now() - age;
        let item = OrderItem {
            id: OrderItemId::new(),
            order_id,
            product_id: ProductId::new(),
            product_name: "Dhoti".to_string(),
            quantity: Quantity::from_units(1).unwrap(),
            price_per_unit: Money::from_rupees(300),
            total_price: Money::from_rupees(300),
            variant: None,
            measurement: None,
        };
        let order = NewOrder {
            id: order_id,
            order_number: format!("ORD-{order_id}"),
            user_id: UserId::new(),
            total_amount: Money::from_rupees(300),
            discount_amount: Money::zero(),
            final_amount: Money::from_rupees(300),
            coupon_code: None,
            shipping_address: "4 Fort Road, Jaipur".to_string(),
            created_at,
        };
        store.create_order(order, vec![item]).await.unwrap();
        order_id
    }

    fn sweeper(store: &InMemoryStore) -> StaleOrderSweeper<InMemoryStore> {
        let payments = PaymentCoordinator::new(store.clone(), PaymentConfig::default());
        StaleOrderSweeper::new(store.clone(), payments, DEFAULT_STALE_AFTER)
    }

    #[tokio::test]
    async fn only_stale_pending_orders_are_abandoned() {
        let store = InMemoryStore::new();
        let stale = seed(&store, chrono::Duration::hours(49)).await;
        let fresh = seed(&store, chrono::Duration::hours(1)).await;
        let stale_attested = seed(&store, chrono::Duration::hours(72)).await;
        store
            .update_payment(stale_attested, PaymentUpdate::attest("UTR5"))
            .await
            .unwrap();

        let abandoned = sweeper(&store).sweep_once(Utc::now()).await.unwrap();
        assert_eq!(abandoned, vec![stale]);

        let fresh_order = store.get_order(fresh).await.unwrap().unwrap();
        assert_eq!(fresh_order.status, OrderStatus::Pending);
        let attested = store.get_order(stale_attested).await.unwrap().unwrap();
        assert_eq!(attested.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn second_sweep_finds_nothing() {
        let store = InMemoryStore::new();
        seed(&store, chrono::Duration::hours(50)).await;
        let sweeper = sweeper(&store);

        assert_eq!(sweeper.sweep_once(Utc::now()).await.unwrap().len(), 1);
        assert!(sweeper.sweep_once(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown() {
        let store = InMemoryStore::new();
        let stale = seed(&store, chrono::Duration::hours(50)).await;
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(sweeper(&store).run(Duration::from_secs(60), rx));
        // First tick fires immediately
        tokio::time::sleep(Duration::from_millis(10)).await;
        let order = store.get_order(stale).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Abandoned);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
