//! Quote, checkout and order history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::OrderId;
use domain::{CheckoutError, PlacedOrder, Quote, require_user};
use serde::{Deserialize, Serialize};
use store::{
    Order, OrderItem, OrderQuery, OrderStatus, PaymentStatus, StorefrontStore, StorefrontStoreExt,
};

use super::{AppState, coupon_code, parse_id};
use crate::auth::CurrentUser;
use crate::error::ApiError;

/// Largest page `GET /orders` returns.
const MAX_PAGE: usize = 100;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct QuoteRequest {
    pub coupon_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub shipping_address: String,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

// -- Handlers --

/// POST /checkout/quote: prices the cart as it would be submitted now.
#[tracing::instrument(skip(state, body))]
pub async fn quote<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    body: Bytes,
) -> Result<Json<Quote>, ApiError> {
    // The body is optional
    let req: QuoteRequest = if body.is_empty() {
        QuoteRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid quote request: {e}")))?
    };
    let quote = state
        .checkout
        .quote(user, coupon_code(req.coupon_code.as_deref()))
        .await?;
    Ok(Json(quote))
}

/// POST /orders: converts the cart into a pending order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<PlacedOrder>), ApiError> {
    let placed = state
        .checkout
        .create_order(
            user,
            &req.shipping_address,
            coupon_code(req.coupon_code.as_deref()),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(placed)))
}

/// GET /orders: the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let user_id = require_user(user)?;

    let mut query = OrderQuery::for_user(user_id)
        .limit(params.limit.unwrap_or(MAX_PAGE).min(MAX_PAGE))
        .offset(params.offset.unwrap_or(0));
    if let Some(status) = params.status.as_deref() {
        query = query.status(status.parse::<OrderStatus>().map_err(ApiError::BadRequest)?);
    }
    if let Some(payment_status) = params.payment_status.as_deref() {
        query = query.payment_status(
            payment_status
                .parse::<PaymentStatus>()
                .map_err(ApiError::BadRequest)?,
        );
    }

    let orders = state.store.query_orders(query).await?;
    Ok(Json(orders))
}

/// GET /orders/:id: one of the caller's orders with its items.
#[tracing::instrument(skip(state))]
pub async fn get<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user_id = require_user(user)?;
    let order_id: OrderId = parse_id(&id, "order id")?;

    let (order, items) = state
        .store
        .load_order_with_items(order_id)
        .await?
        .filter(|(order, _)| order.user_id == user_id)
        .ok_or_else(|| {
            ApiError::from(CheckoutError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })
        })?;

    Ok(Json(OrderResponse { order, items }))
}
