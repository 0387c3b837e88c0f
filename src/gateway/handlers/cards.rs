//! Card endpoints

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
};

use crate::card::{CardRequest, CardView, IssuedCard};
use crate::token::TokenService;

use super::super::middleware::AuthUser;
use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, accepted, created, ok};

/// Request a card; it activates through the emailed link
#[utoipa::path(
    post,
    path = "/api/v1/cards",
    request_body = CardRequest,
    responses(
        (status = 202, description = "Card pending confirmation", body = CardView),
        (status = 400, description = "PIN is not 4 digits"),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "A card is already active"),
        (status = 503, description = "Email queue unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "Cards"
)]
pub async fn request_card(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CardRequest>,
) -> ApiResult<CardView> {
    let card = state.cards.request_card(user.account_id, req).await?;
    accepted(card, "Check your email to activate your card")
}

/// Card of the authenticated account, number masked
#[utoipa::path(
    get,
    path = "/api/v1/cards",
    responses(
        (status = 200, description = "Card", body = CardView),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No card requested")
    ),
    security(("bearer_auth" = [])),
    tag = "Cards"
)]
pub async fn get_card(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<CardView> {
    ok(state.cards.get_card(user.account_id).await?)
}

/// Activate a card. The CVV appears in this response only.
#[utoipa::path(
    get,
    path = "/api/v1/cards/verify/{token}",
    params(("token" = String, Path, description = "40-character hex token")),
    responses(
        (status = 201, description = "Card issued", body = IssuedCard),
        (status = 400, description = "Malformed, unknown or expired token")
    ),
    tag = "Cards"
)]
pub async fn verify_card(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> ApiResult<IssuedCard> {
    if !TokenService::is_well_formed(&token) {
        return Err(ApiError::bad_request("Malformed verification token"));
    }
    created(state.cards.verify_card(&token).await?, "Card created")
}
