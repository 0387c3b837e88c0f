//! Boundary error type
//!
//! Every domain error is translated here, once, into an HTTP status plus the
//! `ApiResponse` envelope. Handlers return `ApiResult<T>` and use `?`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::account::AccountError;
use crate::card::CardError;
use crate::transaction::{StoreError, TransactionError};

use super::response::{ApiResponse, error_codes};

#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

/// 200 with data
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

/// 201 with data
pub fn created<T>(data: T, msg: impl Into<String>) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success_with_msg(data, msg))))
}

/// 202: work has been handed to a queue
pub fn accepted<T>(data: T, msg: impl Into<String>) -> ApiResult<T> {
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success_with_msg(data, msg))))
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED, msg)
    }

    pub fn not_found(code: i32, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }

    /// Internal details are logged, never returned
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        error!(error = %detail, "Internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            "Internal server error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiResponse::<()>::error(self.code, self.msg)),
        )
            .into_response()
    }
}

impl From<TransactionError> for ApiError {
    fn from(e: TransactionError) -> Self {
        if matches!(
            e,
            TransactionError::DatabaseError(_) | TransactionError::SystemError(_)
        ) {
            return ApiError::internal(e);
        }
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = match &e {
            TransactionError::Validation(_) | TransactionError::DescriptionTooShort { .. } => {
                error_codes::INVALID_PARAMETER
            }
            TransactionError::InvalidAmount => error_codes::INVALID_AMOUNT,
            TransactionError::SameAccount => error_codes::SAME_ACCOUNT,
            TransactionError::Unauthorized => error_codes::AUTH_FAILED,
            TransactionError::AccountNotFound => error_codes::ACCOUNT_NOT_FOUND,
            TransactionError::TransactionNotFound => error_codes::TRANSACTION_NOT_FOUND,
            TransactionError::InsufficientBalance => error_codes::INSUFFICIENT_BALANCE,
            TransactionError::ServiceUnavailable(_) => error_codes::SERVICE_UNAVAILABLE,
            TransactionError::DatabaseError(_) | TransactionError::SystemError(_) => {
                error_codes::INTERNAL_ERROR
            }
        };
        ApiError::new(status, code, e.to_string())
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        if matches!(
            e,
            AccountError::DatabaseError(_) | AccountError::SystemError(_)
        ) {
            return ApiError::internal(e);
        }
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = match &e {
            AccountError::Validation(_) => error_codes::INVALID_PARAMETER,
            AccountError::InvalidToken => error_codes::INVALID_TOKEN,
            AccountError::Conflict(_) => error_codes::CONFLICT,
            AccountError::InvalidCredentials | AccountError::Unauthorized => error_codes::AUTH_FAILED,
            AccountError::NotVerified => error_codes::NOT_VERIFIED,
            AccountError::ServiceUnavailable(_) => error_codes::SERVICE_UNAVAILABLE,
            AccountError::DatabaseError(_) | AccountError::SystemError(_) => {
                error_codes::INTERNAL_ERROR
            }
        };
        ApiError::new(status, code, e.to_string())
    }
}

impl From<CardError> for ApiError {
    fn from(e: CardError) -> Self {
        let code = match &e {
            CardError::Validation(_) => error_codes::INVALID_PARAMETER,
            CardError::InvalidToken => error_codes::INVALID_TOKEN,
            CardError::AlreadyIssued => error_codes::CONFLICT,
            CardError::NotFound => error_codes::CARD_NOT_FOUND,
            CardError::Unauthorized => error_codes::AUTH_FAILED,
            CardError::ServiceUnavailable(_) => error_codes::SERVICE_UNAVAILABLE,
            CardError::DatabaseError(_) | CardError::SystemError(_) => return ApiError::internal(e),
        };
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        ApiError::new(status, code, e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::internal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_error_mapping() {
        let e = ApiError::from(TransactionError::TransactionNotFound);
        assert_eq!(e.status, StatusCode::NOT_FOUND);
        assert_eq!(e.code, error_codes::TRANSACTION_NOT_FOUND);

        let e = ApiError::from(TransactionError::ServiceUnavailable("email".into()));
        assert_eq!(e.status, StatusCode::SERVICE_UNAVAILABLE);

        let e = ApiError::from(TransactionError::DatabaseError("pool timed out".into()));
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!e.msg.contains("pool"));
    }

    #[test]
    fn test_account_error_mapping() {
        let e = ApiError::from(AccountError::NotVerified);
        assert_eq!(e.status, StatusCode::FORBIDDEN);
        assert_eq!(e.code, error_codes::NOT_VERIFIED);
        assert_eq!(
            ApiError::from(AccountError::Conflict("taken".into())).status,
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_card_error_mapping() {
        let e = ApiError::from(CardError::NotFound);
        assert_eq!(e.status, StatusCode::NOT_FOUND);
        assert_eq!(e.code, error_codes::CARD_NOT_FOUND);
        assert_eq!(ApiError::from(CardError::AlreadyIssued).status, StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(CardError::SystemError("number space exhausted".into())).msg,
            "Internal server error"
        );
    }
}
