use thiserror::Error;

use crate::account::AccountError;
use crate::queue::QueueError;
use crate::transaction::StoreError;

#[derive(Error, Debug, Clone)]
pub enum CardError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("You already have a card")]
    AlreadyIssued,

    #[error("Card not found")]
    NotFound,

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

impl CardError {
    pub fn http_status(&self) -> u16 {
        match self {
            CardError::Validation(_) | CardError::InvalidToken => 400,
            CardError::Unauthorized => 401,
            CardError::NotFound => 404,
            CardError::AlreadyIssued => 409,
            CardError::ServiceUnavailable(_) => 503,
            CardError::DatabaseError(_) | CardError::SystemError(_) => 500,
        }
    }
}

impl From<StoreError> for CardError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(_) => CardError::AlreadyIssued,
            StoreError::AccountNotFound => CardError::Unauthorized,
            StoreError::Database(msg) => CardError::DatabaseError(msg),
            StoreError::Corrupt(msg) => CardError::SystemError(msg),
        }
    }
}

impl From<QueueError> for CardError {
    fn from(e: QueueError) -> Self {
        CardError::ServiceUnavailable(e.to_string())
    }
}

impl From<AccountError> for CardError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::Validation(msg) => CardError::Validation(msg),
            AccountError::DatabaseError(msg) => CardError::DatabaseError(msg),
            other => CardError::SystemError(other.to_string()),
        }
    }
}
