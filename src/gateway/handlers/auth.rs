//! Account endpoints: register, login, email verification, password reset

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::account::{
    AccountProfile, AuthResponse, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    ResendVerificationRequest, ResetPasswordRequest,
};

use super::super::middleware::AuthUser;
use super::super::state::AppState;
use super::super::types::{ApiResult, created, ok};

/// Body of endpoints that only acknowledge
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageData {
    pub message: String,
}

impl MessageData {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Register a new account
///
/// The account starts unverified; a verification link is emailed.
#[utoipa::path(
    post,
    path = "/api/v1/users/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification email queued", body = AccountProfile),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email or user name already taken"),
        (status = 503, description = "Email queue unavailable")
    ),
    tag = "Users"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<AccountProfile> {
    let profile = state.accounts.register(req).await?;
    created(profile, "Check your email to verify your account")
}

/// Login and receive a JWT
#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 403, description = "Email not verified")
    ),
    tag = "Users"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    ok(state.accounts.login(req).await?)
}

/// Consume an emailed verification link
#[utoipa::path(
    get,
    path = "/api/v1/users/verify/{token}",
    params(("token" = String, Path, description = "40-character hex token")),
    responses(
        (status = 200, description = "Email verified", body = AccountProfile),
        (status = 400, description = "Invalid or expired token")
    ),
    tag = "Users"
)]
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> ApiResult<AccountProfile> {
    ok(state.accounts.verify_email(&token).await?)
}

/// Email a fresh verification link, replacing the previous one
#[utoipa::path(
    post,
    path = "/api/v1/users/resend-verification",
    request_body = ResendVerificationRequest,
    responses(
        (status = 200, description = "Link sent if the account is still unverified", body = MessageData),
        (status = 400, description = "Invalid email"),
        (status = 503, description = "Email queue unavailable")
    ),
    tag = "Users"
)]
pub async fn resend_email_verification(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResendVerificationRequest>,
) -> ApiResult<MessageData> {
    state.accounts.resend_email_verification(req).await?;
    ok(MessageData::new(
        "If the account awaits verification, a new link has been sent",
    ))
}

/// Profile of the authenticated account, balance included
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Current account", body = AccountProfile),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<AccountProfile> {
    ok(state.accounts.profile(user.account_id).await?)
}

/// Request a password reset link
///
/// Always answers the same way, whether or not the email is registered.
#[utoipa::path(
    post,
    path = "/api/v1/users/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset link sent if the account exists", body = MessageData),
        (status = 503, description = "Email queue unavailable")
    ),
    tag = "Users"
)]
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<MessageData> {
    state.accounts.forgot_password(req).await?;
    ok(MessageData::new(
        "If the email is registered, a reset link has been sent",
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/reset-password/{token}",
    params(("token" = String, Path, description = "40-character hex token")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageData),
        (status = 400, description = "Invalid or expired token")
    ),
    tag = "Users"
)]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<MessageData> {
    state.accounts.reset_password(&token, req).await?;
    ok(MessageData::new("Password changed"))
}
