use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
};

use crate::notification::{Notification, NotificationId};

use super::super::middleware::AuthUser;
use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, error_codes, ok};
use super::auth::MessageData;

/// Caller's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    responses((status = 200, description = "Notifications", body = Vec<Notification>)),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<Notification>> {
    ok(state.notifications.list(user.account_id).await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/{id}/read",
    params(("id" = String, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked as read", body = MessageData),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<MessageData> {
    let id: NotificationId = id
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid notification id"))?;

    if !state.notifications.mark_read(id, user.account_id).await? {
        return Err(ApiError::not_found(
            error_codes::NOTIFICATION_NOT_FOUND,
            "Notification not found",
        ));
    }
    ok(MessageData {
        message: "Notification marked as read".into(),
    })
}
