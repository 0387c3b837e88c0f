//! Request payloads for account endpoints and their validation rules
//!
//! Field rules are declared with `validator`; `validate_request` turns the
//! collected errors into one readable message.

use serde::Deserialize;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use super::error::AccountError;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 50, message = "must be 1-50 characters"))]
    #[schema(example = "Ada")]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    #[schema(example = "Lovelace")]
    pub last_name: Option<String>,
    #[validate(length(min = 3, max = 32, message = "must be 3-32 characters"))]
    #[schema(example = "ada")]
    pub user_name: String,
    #[validate(email(message = "must be a valid email address"))]
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "must be 8-128 characters"))]
    #[schema(example = "correct horse")]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "must be a valid email address"))]
    #[schema(example = "ada@example.com")]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ResendVerificationRequest {
    #[validate(email(message = "must be a valid email address"))]
    #[schema(example = "ada@example.com")]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, max = 128, message = "must be 8-128 characters"))]
    pub password: String,
}

/// Run the derived rules, mapping failures to `AccountError::Validation`
pub fn validate_request<T: Validate>(req: &T) -> Result<(), AccountError> {
    req.validate()?;
    Ok(())
}

/// User names: ASCII letters, digits, `_` and `.`
pub fn check_user_name(name: &str) -> Result<(), AccountError> {
    if name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        Ok(())
    } else {
        Err(AccountError::Validation(
            "user_name: may only contain letters, digits, '_' and '.'".into(),
        ))
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// `field: message` pairs sorted by field name
pub(crate) fn describe(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let reason = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, reason)
            })
        })
        .collect();
    parts.sort();
    parts.join("; ")
}
