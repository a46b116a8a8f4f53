//! HTTP API for the storefront checkout.
//!
//! Exposes the cart, checkout and manual payment flows as REST endpoints,
//! with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use domain::{CartService, CheckoutService, CouponValidator};
use metrics_exporter_prometheus::PrometheusHandle;
use payment::{PaymentCoordinator, StaleOrderSweeper};
use store::StorefrontStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: StorefrontStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/cart", get(routes::cart::view::<S>))
        .route("/cart/items", put(routes::cart::put_item::<S>))
        .route(
            "/cart/items/{product_id}",
            patch(routes::cart::update_item::<S>)
                .delete(routes::cart::remove_item::<S>),
        )
        .route("/coupons/validate", post(routes::coupons::validate::<S>))
        .route("/checkout/quote", post(routes::orders::quote::<S>))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{id}/payment",
            post(routes::payment::begin::<S>)
                .get(routes::payment::status::<S>)
                .delete(routes::payment::cancel::<S>),
        )
        .route(
            "/orders/{id}/payment/reference",
            post(routes::payment::submit_reference::<S>),
        )
        .route(
            "/orders/{id}/payment/complete",
            post(routes::payment::complete::<S>),
        )
        .route(
            "/admin/orders/{id}/acknowledge",
            post(routes::admin::acknowledge::<S>),
        )
        .route("/admin/orders/sweep", post(routes::admin::sweep::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the services over one store according to `config`.
pub fn create_state<S: StorefrontStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let payments = PaymentCoordinator::new(store.clone(), config.payment_config());
    let sweeper = StaleOrderSweeper::new(store.clone(), payments.clone(), config.stale_after());

    Arc::new(AppState {
        cart: CartService::new(store.clone()),
        checkout: CheckoutService::with_config(store.clone(), config.checkout_config()),
        coupons: CouponValidator::new(store.clone()),
        payments,
        sweeper,
        admin_token: config.admin_token.clone(),
        store,
    })
}

/// Creates application state with the default configuration.
pub fn create_default_state<S: StorefrontStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    create_state(store, &Config::default())
}
