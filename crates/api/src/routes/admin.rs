//! Operator endpoints, guarded by `x-admin-token`.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use chrono::Utc;
use common::OrderId;
use serde::Serialize;
use store::{Order, StorefrontStore};

use super::{AppState, parse_id};
use crate::auth::require_admin;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct SweepResponse {
    pub abandoned: Vec<OrderId>,
}

/// POST /admin/orders/:id/acknowledge: the operator saw the payment.
#[tracing::instrument(skip(state, headers))]
pub async fn acknowledge<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    require_admin(&headers, state.admin_token.as_deref())?;
    let order_id: OrderId = parse_id(&id, "order id")?;

    let order = state.payments.acknowledge(order_id).await?;
    Ok(Json(order))
}

/// POST /admin/orders/sweep: abandons stale unpaid orders now.
#[tracing::instrument(skip(state, headers))]
pub async fn sweep<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<SweepResponse>, ApiError> {
    require_admin(&headers, state.admin_token.as_deref())?;

    let abandoned = state.sweeper.sweep_once(Utc::now()).await?;
    Ok(Json(SweepResponse { abandoned }))
}
