//! Payment confirmation endpoints for the shopper.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OrderId;
use payment::{Handoff, PaymentProgress, PaymentPrompt};
use serde::{Deserialize, Serialize};
use store::{Order, StorefrontStore};

use super::{AppState, parse_id};
use crate::auth::CurrentUser;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SubmitReferenceRequest {
    pub reference: String,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// POST /orders/:id/payment: opens the payment session.
#[tracing::instrument(skip(state))]
pub async fn begin<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<PaymentPrompt>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    Ok(Json(state.payments.begin(user, order_id).await?))
}

/// GET /orders/:id/payment
#[tracing::instrument(skip(state))]
pub async fn status<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<PaymentProgress>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    Ok(Json(state.payments.status(user, order_id).await?))
}

/// POST /orders/:id/payment/reference: records the UPI transaction
/// reference and returns the operator hand-off.
#[tracing::instrument(skip(state, req))]
pub async fn submit_reference<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<SubmitReferenceRequest>,
) -> Result<Json<Handoff>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    let handoff = state
        .payments
        .submit_reference(user, order_id, &req.reference)
        .await?;
    Ok(Json(handoff))
}

/// POST /orders/:id/payment/complete: attests the payment once settled.
#[tracing::instrument(skip(state))]
pub async fn complete<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    Ok(Json(state.payments.complete(user, order_id).await?))
}

/// DELETE /orders/:id/payment
#[tracing::instrument(skip(state))]
pub async fn cancel<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    let cancelled = state.payments.cancel(user, order_id).await?;
    Ok(Json(CancelResponse { cancelled }))
}
