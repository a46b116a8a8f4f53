//! Caller identity and operator credentials.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user id in `x-user-id`. Services decide whether an identity is required,
//! so a missing or malformed header yields an anonymous caller here.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the operator token.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// The caller, if the request carried a valid user id.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Option<UserId>);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| raw.trim().parse::<UserId>().ok());
        Ok(CurrentUser(user))
    }
}

/// Checks the operator token. `expected` is `None` when operator endpoints
/// are disabled.
pub fn require_admin(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Err(ApiError::Forbidden(
            "Operator endpoints are disabled".to_string(),
        ));
    };

    let supplied = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    match supplied {
        Some(token) if token == expected => Ok(()),
        _ => {
            tracing::warn!("operator request with missing or wrong token");
            Err(ApiError::Unauthorized("Invalid operator token".to_string()))
        }
    }
}
