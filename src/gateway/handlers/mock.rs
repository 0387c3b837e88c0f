//! [SECURITY] Mock deposit, compiled only with the `mock-api` feature.
//! Production builds use `--no-default-features`.

use std::sync::Arc;

use axum::{Extension, Json, extract::State};

use crate::transaction::{DepositRequest, TransactionView};

use super::super::middleware::AuthUser;
use super::super::state::AppState;
use super::super::types::{ApiResult, ok};

/// Credit the caller's balance and record a COMPLETED deposit.
///
/// Not part of the published OpenAPI document.
pub async fn mock_deposit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<DepositRequest>,
) -> ApiResult<TransactionView> {
    let amount = req.amount_minor()?;
    let tx = state.coordinator.deposit(user.account_id, amount).await?;
    ok(TransactionView::from(tx))
}
