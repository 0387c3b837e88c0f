use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::core_types::AccountId;

use super::state::AppState;
use super::types::{ApiError, error_codes};

/// Caller identity injected by [`jwt_auth_middleware`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub account_id: AccountId,
}

/// Token part of an `Authorization: Bearer <jwt>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                error_codes::MISSING_AUTH,
                "Missing Authorization header",
            )
        })?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Invalid token format"))
}

/// Resolve a JWT to the caller's account id
pub fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, ApiError> {
    let claims = state
        .accounts
        .verify_access_token(token)
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;
    let account_id = claims
        .account_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;
    Ok(AuthUser { account_id })
}

pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?;
    let user = authenticate(&state, token)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
