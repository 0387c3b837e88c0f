//! Transaction error types

use thiserror::Error;

use crate::money::MoneyError;
use crate::queue::QueueError;

use super::store::StoreError;

/// Errors surfaced by the transaction state machine.
///
/// `TransactionNotFound` deliberately covers "never existed", "token expired"
/// and "already consumed" so that callers cannot tell them apart.
#[derive(Error, Debug, Clone)]
pub enum TransactionError {
    // === Validation ===
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Description must be at least {min} characters")]
    DescriptionTooShort { min: usize },

    #[error("Sender and receiver cannot be the same account")]
    SameAccount,

    #[error("User not authenticated")]
    Unauthorized,

    // === Lookup ===
    #[error("User Not Found")]
    AccountNotFound,

    #[error("Transaction Not Found")]
    TransactionNotFound,

    /// Settlement-time only; interactive operations never return it
    #[error("Insufficient balance")]
    InsufficientBalance,

    // === System ===
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal system error: {0}")]
    SystemError(String),
}

impl TransactionError {
    /// Error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransactionError::Validation(_) => "VALIDATION_ERROR",
            TransactionError::InvalidAmount => "INVALID_AMOUNT",
            TransactionError::DescriptionTooShort { .. } => "DESCRIPTION_TOO_SHORT",
            TransactionError::SameAccount => "SAME_ACCOUNT",
            TransactionError::Unauthorized => "UNAUTHORIZED",
            TransactionError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            TransactionError::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            TransactionError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            TransactionError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            TransactionError::DatabaseError(_) => "DATABASE_ERROR",
            TransactionError::SystemError(_) => "SYSTEM_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            TransactionError::Validation(_)
            | TransactionError::InvalidAmount
            | TransactionError::DescriptionTooShort { .. }
            | TransactionError::SameAccount => 400,
            TransactionError::Unauthorized => 401,
            TransactionError::AccountNotFound | TransactionError::TransactionNotFound => 404,
            TransactionError::InsufficientBalance => 422,
            TransactionError::ServiceUnavailable(_) => 503,
            TransactionError::DatabaseError(_) | TransactionError::SystemError(_) => 500,
        }
    }

    /// Worth retrying later (queue consumers use this to decide redelivery)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransactionError::ServiceUnavailable(_) | TransactionError::DatabaseError(_)
        )
    }
}

impl From<StoreError> for TransactionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AccountNotFound => TransactionError::AccountNotFound,
            StoreError::Conflict(msg) => TransactionError::Validation(msg),
            StoreError::Database(msg) => TransactionError::DatabaseError(msg),
            StoreError::Corrupt(msg) => TransactionError::SystemError(msg),
        }
    }
}

impl From<QueueError> for TransactionError {
    fn from(e: QueueError) -> Self {
        TransactionError::ServiceUnavailable(e.to_string())
    }
}

impl From<MoneyError> for TransactionError {
    fn from(e: MoneyError) -> Self {
        match e {
            MoneyError::InvalidAmount => TransactionError::InvalidAmount,
            other => TransactionError::Validation(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for TransactionError {
    fn from(e: sqlx::Error) -> Self {
        TransactionError::DatabaseError(e.to_string())
    }
}

impl From<anyhow::Error> for TransactionError {
    fn from(e: anyhow::Error) -> Self {
        TransactionError::SystemError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TransactionError::SameAccount.code(), "SAME_ACCOUNT");
        assert_eq!(
            TransactionError::TransactionNotFound.code(),
            "TRANSACTION_NOT_FOUND"
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(TransactionError::InvalidAmount.http_status(), 400);
        assert_eq!(TransactionError::Unauthorized.http_status(), 401);
        assert_eq!(TransactionError::TransactionNotFound.http_status(), 404);
        assert_eq!(TransactionError::AccountNotFound.http_status(), 404);
        assert_eq!(TransactionError::InsufficientBalance.http_status(), 422);
        assert_eq!(
            TransactionError::ServiceUnavailable("queue".into()).http_status(),
            503
        );
        assert_eq!(TransactionError::SystemError("x".into()).http_status(), 500);
    }

    #[test]
    fn test_queue_error_is_unavailable() {
        let err: TransactionError = QueueError::Full("email".into()).into();
        assert_eq!(err.http_status(), 503);
        assert!(err.is_transient());
    }

    #[test]
    fn test_money_error_mapping() {
        let err: TransactionError = MoneyError::InvalidAmount.into();
        assert!(matches!(err, TransactionError::InvalidAmount));
        let err: TransactionError = MoneyError::Overflow.into();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            TransactionError::AccountNotFound.to_string(),
            "User Not Found"
        );
        assert_eq!(
            TransactionError::DescriptionTooShort { min: 5 }.to_string(),
            "Description must be at least 5 characters"
        );
    }
}
