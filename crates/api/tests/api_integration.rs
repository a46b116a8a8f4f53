//! Integration tests for the API server.

use std::sync::Arc;
use std::sync::OnceLock;

use api::config::Config;
use api::routes::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use common::{Money, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use store::{Coupon, CouponDiscount, InMemoryStore, Product, StorefrontStore};
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "ops-token";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    store: InMemoryStore,
    state: Arc<AppState<InMemoryStore>>,
    user: UserId,
    product: Product,
}

impl TestApp {
    async fn new(settling_seconds: u64) -> Self {
        let store = InMemoryStore::new();
        let product = Product::new("Kanjeevaram Saree", Money::from_rupees(450));
        store.put_product(product.clone()).await.unwrap();
        store
            .put_coupon(Coupon::new(
                "SAVE10",
                CouponDiscount::Percentage {
                    percent: Decimal::from(10),
                    max_discount: None,
                },
            ))
            .await
            .unwrap();
        store
            .put_coupon(
                Coupon::new(
                    "BIG500",
                    CouponDiscount::Fixed {
                        amount: Money::from_rupees(500),
                    },
                )
                .with_min_order_amount(Money::from_rupees(5000)),
            )
            .await
            .unwrap();

        let config = Config {
            admin_token: Some(ADMIN_TOKEN.to_string()),
            settling_seconds,
            ..Config::default()
        };
        let state = api::create_state(store.clone(), &config);
        let app = api::create_app(state.clone(), get_metrics_handle());

        Self {
            app,
            store,
            state,
            user: UserId::new(),
            product,
        }
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        user: Option<UserId>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn as_user(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(method, uri, Some(self.user), body).await
    }

    async fn admin(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(token) = token {
            builder = builder.header("x-admin-token", token);
        }
        let response = self
            .app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn fill_cart(&self) {
        let (status, _) = self
            .as_user(
                "PUT",
                "/cart/items",
                Some(json!({ "product_id": self.product.id, "quantity": 2 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    async fn place_order(&self) -> Value {
        self.fill_cart().await;
        let (status, placed) = self
            .as_user(
                "POST",
                "/orders",
                Some(json!({ "shipping_address": "12 Temple Street, Madurai" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{placed}");
        placed
    }
}

#[tokio::test]
async fn test_health_check() {
    let t = TestApp::new(0).await;
    let (status, json) = t.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["open_payment_sessions"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = TestApp::new(0).await;
    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_cart_requires_identity() {
    let t = TestApp::new(0).await;

    let (status, json) = t.send("GET", "/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Authentication required");

    let (status, _) = t
        .send(
            "POST",
            "/orders",
            None,
            Some(json!({ "shipping_address": "12 Temple Street, Madurai" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cart_view_with_coupon() {
    let t = TestApp::new(0).await;
    t.fill_cart().await;

    let (status, view) = t.as_user("GET", "/cart?coupon=save10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["lines"].as_array().unwrap().len(), 1);
    assert_eq!(view["pricing"]["subtotal"]["paise"], 90_000);
    assert_eq!(view["pricing"]["discount"]["paise"], 9_000);
    assert_eq!(view["pricing"]["final"]["paise"], 81_000);
    assert_eq!(view["coupon"]["status"], "applied");

    // A rejected coupon is reported, not raised
    let (status, view) = t.as_user("GET", "/cart?coupon=BIG500", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["coupon"]["status"], "rejected");
    assert_eq!(view["pricing"]["final"]["paise"], 90_000);
}

#[tokio::test]
async fn test_update_and_remove_cart_item() {
    let t = TestApp::new(0).await;
    t.fill_cart().await;
    let uri = format!("/cart/items/{}", t.product.id);

    let (status, item) = t.as_user("PATCH", &uri, Some(json!({ "quantity": 3 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["product_id"], t.product.id.to_string());

    let (status, _) = t.as_user("PATCH", &uri, Some(json!({ "quantity": 0 }))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = t.as_user("DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], false);
}

#[tokio::test]
async fn test_unknown_product_cannot_be_added() {
    let t = TestApp::new(0).await;
    let (status, _) = t
        .as_user(
            "PUT",
            "/cart/items",
            Some(json!({ "product_id": common::ProductId::new(), "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_coupon_validation() {
    let t = TestApp::new(0).await;

    let (status, json) = t
        .send(
            "POST",
            "/coupons/validate",
            None,
            Some(json!({ "code": " save10 ", "subtotal_paise": 100_000 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["code"], "SAVE10");
    assert_eq!(json["discount_type"], "percentage");
    assert_eq!(json["discount"]["paise"], 10_000);
    assert_eq!(json["final_amount"]["paise"], 90_000);

    let (status, json) = t
        .send(
            "POST",
            "/coupons/validate",
            None,
            Some(json!({ "code": "BIG500", "subtotal_paise": 100_000 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["reason"], "below_minimum");

    let (status, json) = t
        .send(
            "POST",
            "/coupons/validate",
            None,
            Some(json!({ "code": "NOPE", "subtotal_paise": 100_000 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["reason"], "invalid_code");
}

#[tokio::test]
async fn test_quote_and_create_order() {
    let t = TestApp::new(0).await;
    t.fill_cart().await;

    let (status, quote) = t
        .as_user("POST", "/checkout/quote", Some(json!({ "coupon_code": "SAVE10" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["pricing"]["final"]["paise"], 81_000);
    assert_eq!(quote["coupon_code"], "SAVE10");

    let (status, placed) = t
        .as_user(
            "POST",
            "/orders",
            Some(json!({
                "shipping_address": "12 Temple Street, Madurai",
                "coupon_code": "SAVE10"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(placed["order"]["order_number"].as_str().unwrap().starts_with("ORD-"));
    assert_eq!(placed["order"]["total_amount"]["paise"], 90_000);
    assert_eq!(placed["order"]["discount_amount"]["paise"], 9_000);
    assert_eq!(placed["order"]["final_amount"]["paise"], 81_000);
    assert_eq!(placed["order"]["status"], "pending");
    assert_eq!(placed["order"]["payment_status"], "pending");
    assert_eq!(placed["items"].as_array().unwrap().len(), 1);

    let order_id = placed["order"]["id"].as_str().unwrap().to_string();
    let (status, fetched) = t.as_user("GET", &format!("/orders/{order_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["order"]["id"], order_id);
    assert_eq!(fetched["items"][0]["product_name"], "Kanjeevaram Saree");

    let (status, list) = t.as_user("GET", "/orders?status=pending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_checkout_rejections() {
    let t = TestApp::new(0).await;

    let (status, json) = t
        .as_user(
            "POST",
            "/orders",
            Some(json!({ "shipping_address": "12 Temple Street, Madurai" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Cart is empty");

    t.fill_cart().await;
    let (status, _) = t
        .as_user("POST", "/orders", Some(json!({ "shipping_address": "   short " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = t
        .as_user(
            "POST",
            "/orders",
            Some(json!({
                "shipping_address": "12 Temple Street, Madurai",
                "coupon_code": "BIG500"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["reason"], "below_minimum");
    assert_eq!(t.store.order_count().await, 0);
}

#[tokio::test]
async fn test_invalid_order_id_format() {
    let t = TestApp::new(0).await;
    let (status, _) = t.as_user("GET", "/orders/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t.as_user("POST", "/orders/not-a-uuid/payment", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_foreign_order_is_not_found() {
    let t = TestApp::new(0).await;
    let placed = t.place_order().await;
    let order_id = placed["order"]["id"].as_str().unwrap();
    let stranger = Some(UserId::new());

    let (status, _) = t
        .send("GET", &format!("/orders/{order_id}"), stranger, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t
        .send("POST", &format!("/orders/{order_id}/payment"), stranger, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_full_payment_flow() {
    let t = TestApp::new(0).await;
    let placed = t.place_order().await;
    let order_id = placed["order"]["id"].as_str().unwrap();
    let payment_uri = format!("/orders/{order_id}/payment");

    let (status, prompt) = t.as_user("POST", &payment_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prompt["state"], "awaiting_reference");
    assert_eq!(prompt["amount"]["paise"], 90_000);
    assert!(prompt["upi_link"].as_str().unwrap().starts_with("upi://pay?"));

    let (status, json) = t
        .as_user(
            "POST",
            &format!("{payment_uri}/reference"),
            Some(json!({ "reference": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");

    let (status, handoff) = t
        .as_user(
            "POST",
            &format!("{payment_uri}/reference"),
            Some(json!({ "reference": "412345678901" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(handoff["message"].as_str().unwrap().contains("412345678901"));
    assert!(handoff["whatsapp_url"].as_str().unwrap().starts_with("https://wa.me/"));

    let (status, progress) = t.as_user("GET", &payment_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["state"], "settling");

    let (status, order) = t
        .as_user("POST", &format!("{payment_uri}/complete"), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(order["payment_status"], "attested");
    assert_eq!(order["payment_reference"], "412345678901");

    let (_, view) = t.as_user("GET", "/cart", None).await;
    assert!(view["lines"].as_array().unwrap().is_empty());

    let (status, order) = t
        .admin(&format!("/admin/orders/{order_id}/acknowledge"), Some(ADMIN_TOKEN))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "confirmed");
    assert_eq!(order["payment_status"], "completed");
}

#[tokio::test]
async fn test_completion_before_settling_is_conflict() {
    let t = TestApp::new(3).await;
    let placed = t.place_order().await;
    let order_id = placed["order"]["id"].as_str().unwrap();
    let payment_uri = format!("/orders/{order_id}/payment");

    t.as_user(
        "POST",
        &format!("{payment_uri}/reference"),
        Some(json!({ "reference": "UTR77" })),
    )
    .await;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("{payment_uri}/complete"))
                .header("x-user-id", t.user.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(response.headers().contains_key("retry-after"));

    let (status, json) = t.as_user("DELETE", &payment_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cancelled"], true);
    assert_eq!(t.state.payments.session_count().await, 0);
}

#[tokio::test]
async fn test_admin_endpoints_require_token() {
    let t = TestApp::new(0).await;
    let placed = t.place_order().await;
    let order_id = placed["order"]["id"].as_str().unwrap();
    let uri = format!("/admin/orders/{order_id}/acknowledge");

    let (status, _) = t.admin(&uri, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t.admin(&uri, Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Nothing to acknowledge before the shopper attests
    let (status, _) = t.admin(&uri, Some(ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_admin_disabled_without_token() {
    let store = InMemoryStore::new();
    let app = api::create_app(api::create_default_state(store), get_metrics_handle());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/orders/sweep")
                .header("x-admin-token", "anything")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_sweep_abandons_stale_orders() {
    let t = TestApp::new(0).await;
    let placed = t.place_order().await;
    let order_id: common::OrderId = placed["order"]["id"].as_str().unwrap().parse().unwrap();

    t.store
        .backdate_order(order_id, Utc::now() - chrono::Duration::hours(49))
        .await;

    let (status, json) = t.admin("/admin/orders/sweep", Some(ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["abandoned"], json!([order_id]));

    let (status, json) = t
        .as_user("POST", &format!("/orders/{order_id}/payment"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("abandoned"));
}
