//! Account error types

use thiserror::Error;

use crate::queue::QueueError;
use crate::transaction::StoreError;

#[derive(Error, Debug, Clone)]
pub enum AccountError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// Unknown email and wrong password look the same
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email address has not been verified")]
    NotVerified,

    /// Malformed, expired or already consumed
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("User not authenticated")]
    Unauthorized,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal system error: {0}")]
    SystemError(String),
}

impl AccountError {
    pub fn code(&self) -> &'static str {
        match self {
            AccountError::Validation(_) => "VALIDATION_ERROR",
            AccountError::Conflict(_) => "CONFLICT",
            AccountError::InvalidCredentials => "INVALID_CREDENTIALS",
            AccountError::NotVerified => "NOT_VERIFIED",
            AccountError::InvalidToken => "INVALID_TOKEN",
            AccountError::Unauthorized => "UNAUTHORIZED",
            AccountError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AccountError::DatabaseError(_) => "DATABASE_ERROR",
            AccountError::SystemError(_) => "SYSTEM_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            AccountError::Validation(_) | AccountError::InvalidToken => 400,
            AccountError::InvalidCredentials | AccountError::Unauthorized => 401,
            AccountError::NotVerified => 403,
            AccountError::Conflict(_) => 409,
            AccountError::ServiceUnavailable(_) => 503,
            AccountError::DatabaseError(_) | AccountError::SystemError(_) => 500,
        }
    }
}

impl From<StoreError> for AccountError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(msg) => AccountError::Conflict(msg),
            StoreError::AccountNotFound => AccountError::InvalidCredentials,
            StoreError::Database(msg) => AccountError::DatabaseError(msg),
            other => AccountError::SystemError(other.to_string()),
        }
    }
}

impl From<QueueError> for AccountError {
    fn from(e: QueueError) -> Self {
        AccountError::ServiceUnavailable(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AccountError {
    fn from(e: validator::ValidationErrors) -> Self {
        AccountError::Validation(super::validation::describe(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AccountError::InvalidCredentials.http_status(), 401);
        assert_eq!(AccountError::NotVerified.http_status(), 403);
        assert_eq!(AccountError::Conflict("taken".into()).http_status(), 409);
        assert_eq!(
            AccountError::from(QueueError::Full("email".into())).http_status(),
            503
        );
        assert!(matches!(
            AccountError::from(StoreError::Conflict("dup".into())),
            AccountError::Conflict(_)
        ));
    }
}
