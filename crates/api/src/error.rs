//! API error types with HTTP response mapping.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use domain::{CheckoutError, CouponError, CouponRejection};
use payment::PaymentError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Operator credentials missing or wrong.
    Unauthorized(String),
    /// Operator endpoints are not enabled.
    Forbidden(String),
    /// Cart or checkout error.
    Checkout(CheckoutError),
    /// Payment confirmation error.
    Payment(PaymentError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut reason = None;
        let mut retry_after = None;

        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Checkout(err) => {
                if let CheckoutError::CouponRejected(rejection) = &err {
                    reason = Some(rejection.code());
                }
                checkout_error_to_response(err)
            }
            ApiError::Payment(err) => {
                if let PaymentError::SettlingNotElapsed { remaining } = &err {
                    // Whole seconds, rounded up
                    retry_after = Some(remaining.as_millis().div_ceil(1000).max(1));
                }
                payment_error_to_response(err)
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        metrics::counter!("api_errors_total", "status" => status.as_u16().to_string())
            .increment(1);

        let body = match reason {
            Some(reason) => serde_json::json!({ "error": message, "reason": reason }),
            None => serde_json::json!({ "error": message }),
        };
        let mut response = (status, axum::Json(body)).into_response();
        if let Some(secs) = retry_after
            && let Ok(value) = HeaderValue::from_str(&secs.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::AuthRequired => (StatusCode::UNAUTHORIZED, err.to_string()),
        CheckoutError::Validation { .. }
        | CheckoutError::EmptyCart
        | CheckoutError::AmountOutOfRange(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        CheckoutError::ProductUnavailable(_) | CheckoutError::CheckoutInProgress => {
            (StatusCode::CONFLICT, err.to_string())
        }
        CheckoutError::CouponRejected(_) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        CheckoutError::Store(store_err) => store_error_status(store_err, err.to_string()),
    }
}

fn payment_error_to_response(err: PaymentError) -> (StatusCode, String) {
    match &err {
        PaymentError::AuthRequired => (StatusCode::UNAUTHORIZED, err.to_string()),
        PaymentError::EmptyReference => (StatusCode::BAD_REQUEST, err.to_string()),
        PaymentError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        PaymentError::OrderNotPayable { .. }
        | PaymentError::OrderAbandoned(_)
        | PaymentError::InvalidState { .. }
        | PaymentError::SettlingNotElapsed { .. }
        | PaymentError::PaymentStatusConflict { .. } => (StatusCode::CONFLICT, err.to_string()),
        PaymentError::InvalidLink(_) => {
            tracing::error!(error = %err, "payment link could not be built");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        PaymentError::Store(store_err) => store_error_status(store_err, err.to_string()),
    }
}

fn store_error_status(err: &StoreError, message: String) -> (StatusCode, String) {
    match err {
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, message),
        StoreError::UniqueViolation { .. }
        | StoreError::PaymentStatusConflict { .. }
        | StoreError::OrderAbandoned(_) => (StatusCode::CONFLICT, message),
        _ => {
            tracing::error!(error = %message, "store failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal storage error".to_string(),
            )
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Payment(err)
    }
}

impl From<CouponError> for ApiError {
    fn from(err: CouponError) -> Self {
        ApiError::Checkout(err.into())
    }
}

impl From<CouponRejection> for ApiError {
    fn from(rejection: CouponRejection) -> Self {
        ApiError::Checkout(CheckoutError::CouponRejected(rejection))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Checkout(CheckoutError::Store(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, OrderId};
    use std::time::Duration;

    #[test]
    fn status_codes_follow_error_kind() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (CheckoutError::AuthRequired.into(), StatusCode::UNAUTHORIZED),
            (CheckoutError::EmptyCart.into(), StatusCode::BAD_REQUEST),
            (CheckoutError::CheckoutInProgress.into(), StatusCode::CONFLICT),
            (
                CheckoutError::AmountOutOfRange(domain::AmountOverflow).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                CouponRejection::BelowMinimum {
                    min_order_amount: Money::from_rupees(500),
                }
                .into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (PaymentError::EmptyReference.into(), StatusCode::BAD_REQUEST),
            (
                PaymentError::OrderNotFound(OrderId::new()).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                PaymentError::OrderAbandoned(OrderId::new()).into(),
                StatusCode::CONFLICT,
            ),
            (
                StoreError::CorruptRecord("bad status".to_string()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn settling_error_sets_retry_after() {
        let err = ApiError::from(PaymentError::SettlingNotElapsed {
            remaining: Duration::from_millis(1200),
        });
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }
}
