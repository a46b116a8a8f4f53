//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use store::StorefrontStore;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub open_payment_sessions: usize,
}

/// GET /health: liveness plus the number of payments awaiting completion.
pub async fn check<S: StorefrontStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        open_payment_sessions: state.payments.session_count().await,
    })
}
