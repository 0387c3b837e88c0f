//! Liveness plus a storage ping

use std::sync::Arc;

use axum::extract::State;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, ok};

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = 1703494800000_i64)]
    pub timestamp_ms: i64,
    /// Git revision the binary was built from
    #[schema(example = "3f2c1ab")]
    pub build: String,
}

/// 503 when the configured PostgreSQL pool does not answer. The cause is
/// logged, never returned.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "Storage unreachable")
    ),
    tag = "System"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    if let Some(db) = &state.pg_db {
        db.ping().await.map_err(|e| {
            tracing::error!(error = %e, "PostgreSQL ping failed");
            ApiError::service_unavailable("unavailable")
        })?;
    }

    ok(HealthResponse {
        timestamp_ms: Utc::now().timestamp_millis(),
        build: env!("GIT_HASH").to_string(),
    })
}
