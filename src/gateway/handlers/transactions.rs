//! Transaction endpoints
//!
//! Thin adapters over `TransactionCoordinator`: parse the amount, call the
//! coordinator, map the result. Asynchronous steps answer 202.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
};

use crate::token::TokenService;
use crate::transaction::{
    RequestMoneyRequest, SendMoneyRequest, TransactionAccepted, TransactionId, TransactionView,
};

use super::super::middleware::AuthUser;
use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, accepted, created, ok};

fn parse_id(raw: &str) -> Result<TransactionId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request("Invalid transaction id"))
}

/// Start a transfer; the sender confirms it through the emailed link
#[utoipa::path(
    post,
    path = "/api/v1/transactions/send",
    request_body = SendMoneyRequest,
    responses(
        (status = 202, description = "Transfer pending verification", body = TransactionAccepted),
        (status = 400, description = "Invalid amount, description or self-transfer"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Receiver not found"),
        (status = 503, description = "Email queue unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "Transactions"
)]
pub async fn send_money(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SendMoneyRequest>,
) -> ApiResult<TransactionAccepted> {
    let amount = req.amount_minor()?;
    let tx = state
        .coordinator
        .initiate_transfer(user.account_id, &req.email, amount, req.description)
        .await?;
    accepted(
        TransactionAccepted::new(&tx, "Check your email to confirm the transfer"),
        "Transaction pending verification",
    )
}

/// Confirm a transfer with the emailed token and queue it for settlement
#[utoipa::path(
    get,
    path = "/api/v1/transactions/verify/{token}",
    params(("token" = String, Path, description = "40-character hex token")),
    responses(
        (status = 202, description = "Transaction queued for settlement", body = TransactionAccepted),
        (status = 400, description = "Malformed token"),
        (status = 404, description = "Unknown, expired or already used token"),
        (status = 503, description = "Settlement queue unavailable, retry the link")
    ),
    tag = "Transactions"
)]
pub async fn verify_transfer(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> ApiResult<TransactionAccepted> {
    if !TokenService::is_well_formed(&token) {
        return Err(ApiError::bad_request("Malformed verification token"));
    }
    let tx = state.coordinator.verify_transfer(&token).await?;
    accepted(
        TransactionAccepted::new(&tx, "Transaction queued for processing"),
        "Transaction queued",
    )
}

/// Ask another account for money
#[utoipa::path(
    post,
    path = "/api/v1/transactions/request",
    request_body = RequestMoneyRequest,
    responses(
        (status = 201, description = "Request created", body = TransactionView),
        (status = 400, description = "Invalid amount, description or self-request"),
        (status = 404, description = "Counterparty not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Transactions"
)]
pub async fn request_money(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<RequestMoneyRequest>,
) -> ApiResult<TransactionView> {
    let amount = req.amount_minor()?;
    let tx = state
        .coordinator
        .request_money(user.account_id, &req.email, amount, req.description)
        .await?;
    created(TransactionView::from(tx), "Money request created")
}

#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/approve",
    params(("id" = String, Path, description = "Transaction id")),
    responses(
        (status = 202, description = "Verification email sent to the payer", body = TransactionAccepted),
        (status = 404, description = "No pending request for this user"),
        (status = 503, description = "Email queue unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "Transactions"
)]
pub async fn approve_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<TransactionAccepted> {
    let tx = state
        .coordinator
        .approve_request(parse_id(&id)?, user.account_id)
        .await?;
    accepted(
        TransactionAccepted::new(&tx, "Verification email sent to the payer"),
        "Request approved",
    )
}

#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/reject",
    params(("id" = String, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Request rejected", body = TransactionView),
        (status = 404, description = "No pending request for this user")
    ),
    security(("bearer_auth" = [])),
    tag = "Transactions"
)]
pub async fn reject_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<TransactionView> {
    let tx = state
        .coordinator
        .reject_request(parse_id(&id)?, user.account_id)
        .await?;
    ok(TransactionView::from(tx))
}

/// Re-issue the verification link of a pending transaction
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/resend",
    params(("id" = String, Path, description = "Transaction id")),
    responses(
        (status = 202, description = "New verification email queued", body = TransactionAccepted),
        (status = 404, description = "No pending transaction awaiting verification"),
        (status = 503, description = "Email queue unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "Transactions"
)]
pub async fn resend_verification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<TransactionAccepted> {
    let tx = state
        .coordinator
        .resend_verification(parse_id(&id)?, user.account_id)
        .await?;
    accepted(
        TransactionAccepted::new(&tx, "A new verification link has been sent"),
        "Verification resent",
    )
}

/// Completed transactions where the caller is a party, newest first
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    responses((status = 200, description = "Completed transactions", body = Vec<TransactionView>)),
    security(("bearer_auth" = [])),
    tag = "Transactions"
)]
pub async fn list_completed(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<TransactionView>> {
    let txs = state.coordinator.list_completed(user.account_id).await?;
    ok(txs.iter().map(TransactionView::from).collect())
}

/// Pending money requests involving the caller
#[utoipa::path(
    get,
    path = "/api/v1/transactions/requested",
    responses((status = 200, description = "Pending requests", body = Vec<TransactionView>)),
    security(("bearer_auth" = [])),
    tag = "Transactions"
)]
pub async fn list_requested(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<TransactionView>> {
    let txs = state.coordinator.list_requested(user.account_id).await?;
    ok(txs.iter().map(TransactionView::from).collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/transactions/{id}",
    params(("id" = String, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Transaction", body = TransactionView),
        (status = 404, description = "Not found or not a party")
    ),
    security(("bearer_auth" = [])),
    tag = "Transactions"
)]
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<TransactionView> {
    let tx = state
        .coordinator
        .get_transaction(parse_id(&id)?, user.account_id)
        .await?;
    ok(TransactionView::from(tx))
}
