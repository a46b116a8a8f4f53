//! Integration tests for the checkout-to-payment lifecycle.

use std::time::Duration;

use chrono::Utc;
use common::{Money, UserId};
use domain::{AddToCart, CartService, CheckoutService, PlacedOrder};
use payment::{
    MerchantConfig, PaymentConfig, PaymentCoordinator, PaymentError, PaymentState,
    StaleOrderSweeper,
};
use rust_decimal::Decimal;
use store::{InMemoryStore, OrderStatus, PaymentStatus, Product, StorefrontStore, StorefrontStoreExt};

const SETTLING: Duration = Duration::from_secs(3);

struct TestHarness {
    store: InMemoryStore,
    cart: CartService<InMemoryStore>,
    checkout: CheckoutService<InMemoryStore>,
    payments: PaymentCoordinator<InMemoryStore>,
    user: UserId,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let config = PaymentConfig {
            settling: SETTLING,
            merchant: MerchantConfig {
                upi_id: "handloom@okaxis".to_string(),
                payee_name: "Handloom House".to_string(),
                operator_whatsapp: "+91 90000 12345".to_string(),
            },
        };
        Self {
            cart: CartService::new(store.clone()),
            checkout: CheckoutService::new(store.clone()),
            payments: PaymentCoordinator::new(store.clone(), config),
            store,
            user: UserId::new(),
        }
    }

    async fn place_order(&self) -> PlacedOrder {
        let product = Product::new("Ikat Dupatta", Money::from_rupees(450));
        self.store.put_product(product.clone()).await.unwrap();
        self.cart
            .add_item(Some(self.user), AddToCart::new(product.id, Decimal::from(2)))
            .await
            .unwrap();
        self.checkout
            .create_order(Some(self.user), "18 Weavers Lane, Varanasi", None)
            .await
            .unwrap()
    }
}

#[tokio::test(start_paused = true)]
async fn completed_payment_attests_order_and_releases_cart() {
    let h = TestHarness::new();
    let placed = h.place_order().await;
    let order_id = placed.order.id;

    let prompt = h.payments.begin(Some(h.user), order_id).await.unwrap();
    assert_eq!(prompt.amount, Money::from_rupees(900));
    assert!(prompt.upi_link.starts_with("upi://pay?"));

    let handoff = h
        .payments
        .submit_reference(Some(h.user), order_id, " 412345678901 ")
        .await
        .unwrap();
    assert!(handoff.message.contains(&placed.order.order_number));
    assert!(handoff.message.contains("412345678901"));
    assert!(handoff.whatsapp_url.starts_with("https://wa.me/919000012345?text="));

    // Nothing persisted while settling
    let stored = h.store.require_order(order_id).await.unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
    assert!(!h.store.cart_is_empty(h.user).await.unwrap());

    let progress = h.payments.status(Some(h.user), order_id).await.unwrap();
    assert_eq!(progress.state, PaymentState::Settling);
    assert_eq!(progress.settle_remaining_ms, Some(3000));

    tokio::time::advance(SETTLING).await;
    let order = h.payments.complete(Some(h.user), order_id).await.unwrap();

    assert_eq!(order.payment_status, PaymentStatus::Attested);
    assert_eq!(order.payment_reference.as_deref(), Some("412345678901"));
    assert!(h.store.cart_is_empty(h.user).await.unwrap());

    assert_eq!(h.payments.session_count().await, 0);
    let progress = h.payments.status(Some(h.user), order_id).await.unwrap();
    assert_eq!(progress.state, PaymentState::Completed);

    let confirmed = h.payments.acknowledge(order_id).await.unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert_eq!(confirmed.payment_status, PaymentStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn completion_before_cooldown_is_rejected() {
    let h = TestHarness::new();
    let order_id = h.place_order().await.order.id;
    h.payments
        .submit_reference(Some(h.user), order_id, "UTR1")
        .await
        .unwrap();

    tokio::time::advance(Duration::from_millis(2500)).await;
    let result = h.payments.complete(Some(h.user), order_id).await;
    match result {
        Err(PaymentError::SettlingNotElapsed { remaining }) => {
            assert_eq!(remaining, Duration::from_millis(500));
        }
        other => panic!("expected SettlingNotElapsed, got {other:?}"),
    }
    assert!(!h.store.cart_is_empty(h.user).await.unwrap());

    tokio::time::advance(Duration::from_millis(500)).await;
    assert!(h.payments.complete(Some(h.user), order_id).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn retry_after_partial_failure_does_not_rewrite_attestation() {
    let h = TestHarness::new();
    let order_id = h.place_order().await.order.id;
    h.payments
        .submit_reference(Some(h.user), order_id, "UTR-FIRST")
        .await
        .unwrap();
    tokio::time::advance(SETTLING).await;

    // Simulate a crash after the attestation write but before the cart release
    h.store
        .update_payment(order_id, store::PaymentUpdate::attest("UTR-FIRST"))
        .await
        .unwrap();

    let order = h.payments.complete(Some(h.user), order_id).await.unwrap();
    assert_eq!(order.payment_reference.as_deref(), Some("UTR-FIRST"));
    assert!(h.store.cart_is_empty(h.user).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn abandoned_orders_cannot_be_paid() {
    let h = TestHarness::new();
    let order_id = h.place_order().await.order.id;
    h.payments.begin(Some(h.user), order_id).await.unwrap();

    h.store
        .backdate_order(order_id, Utc::now() - chrono::Duration::hours(49))
        .await;
    let sweeper = StaleOrderSweeper::new(
        h.store.clone(),
        h.payments.clone(),
        payment::DEFAULT_STALE_AFTER,
    );
    assert_eq!(sweeper.sweep_once(Utc::now()).await.unwrap(), vec![order_id]);
    assert_eq!(h.payments.session_count().await, 0);

    let begin = h.payments.begin(Some(h.user), order_id).await;
    assert!(matches!(begin, Err(PaymentError::OrderAbandoned(id)) if id == order_id));
}

#[tokio::test(start_paused = true)]
async fn order_abandoned_while_settling_is_not_attested() {
    let h = TestHarness::new();
    let order_id = h.place_order().await.order.id;
    h.payments
        .submit_reference(Some(h.user), order_id, "UTR9")
        .await
        .unwrap();
    tokio::time::advance(SETTLING).await;

    h.store
        .backdate_order(order_id, Utc::now() - chrono::Duration::hours(49))
        .await;
    h.store
        .abandon_stale_orders(Utc::now() - chrono::Duration::hours(48))
        .await
        .unwrap();

    let result = h.payments.complete(Some(h.user), order_id).await;
    assert!(matches!(result, Err(PaymentError::OrderAbandoned(_))));
    assert!(!h.store.cart_is_empty(h.user).await.unwrap());
}

#[tokio::test]
async fn another_users_order_is_invisible() {
    let h = TestHarness::new();
    let order_id = h.place_order().await.order.id;
    let stranger = Some(UserId::new());

    assert!(matches!(
        h.payments.submit_reference(stranger, order_id, "UTR").await,
        Err(PaymentError::OrderNotFound(_))
    ));
    assert!(matches!(
        h.payments.complete(stranger, order_id).await,
        Err(PaymentError::OrderNotFound(_))
    ));
    assert!(matches!(
        h.payments.cancel(stranger, order_id).await,
        Err(PaymentError::OrderNotFound(_))
    ));
}
