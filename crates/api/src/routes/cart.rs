//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::ProductId;
use domain::{AddToCart, CartView};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::{CartItem, StorefrontStore};

use super::{AppState, coupon_code, parse_id};
use crate::auth::CurrentUser;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CartQuery {
    pub coupon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub variant: Option<String>,
    pub measurement: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: Decimal,
}

#[derive(Serialize)]
pub struct RemovedResponse {
    pub removed: bool,
}

/// GET /cart: priced cart, optionally with a coupon applied.
#[tracing::instrument(skip(state))]
pub async fn view<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<CartQuery>,
) -> Result<Json<CartView>, ApiError> {
    let view = state
        .cart
        .view(user, coupon_code(query.coupon.as_deref()))
        .await?;
    Ok(Json(view))
}

/// PUT /cart/items: add a product or replace its line.
#[tracing::instrument(skip(state, req))]
pub async fn put_item<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartItem>, ApiError> {
    let mut request = AddToCart::new(req.product_id, req.quantity);
    if let Some(variant) = req.variant {
        request = request.with_variant(variant);
    }
    if let Some(measurement) = req.measurement {
        request = request.with_measurement(measurement);
    }

    let item = state.cart.add_item(user, request).await?;
    Ok(Json(item))
}

/// PATCH /cart/items/:product_id: change a quantity; zero removes the line.
#[tracing::instrument(skip(state, req))]
pub async fn update_item<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<String>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Response, ApiError> {
    let product_id: ProductId = parse_id(&product_id, "product id")?;

    match state
        .cart
        .update_quantity(user, product_id, req.quantity)
        .await?
    {
        Some(item) => Ok(Json(item).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// DELETE /cart/items/:product_id
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<String>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let product_id: ProductId = parse_id(&product_id, "product id")?;
    let removed = state.cart.remove_item(user, product_id).await?;
    Ok(Json(RemovedResponse { removed }))
}
