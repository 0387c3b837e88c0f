//! Response envelope and numeric error codes
//!
//! Every endpoint answers `{ "code", "msg", "data" }`. `code` is 0 on
//! success; on failure it is one of [`error_codes`] and `data` is omitted.

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// 0 on success, otherwise an `error_codes` value
    #[schema(example = 0)]
    pub code: i32,
    #[schema(example = "ok")]
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::success_with_msg(data, "ok")
    }

    /// e.g. "Transaction queued" for the 202 answers
    pub fn success_with_msg(data: T, msg: impl Into<String>) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: msg.into(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Grouped by thousand: 1xxx request, 2xxx auth, 4xxx resource, 5xxx server
pub mod error_codes {
    pub const SUCCESS: i32 = 0;

    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;
    pub const INVALID_AMOUNT: i32 = 1003;
    pub const SAME_ACCOUNT: i32 = 1004;
    pub const INVALID_TOKEN: i32 = 1005;

    pub const MISSING_AUTH: i32 = 2001;
    pub const AUTH_FAILED: i32 = 2002;
    pub const NOT_VERIFIED: i32 = 2003;

    pub const ACCOUNT_NOT_FOUND: i32 = 4001;
    pub const TRANSACTION_NOT_FOUND: i32 = 4002;
    pub const NOTIFICATION_NOT_FOUND: i32 = 4003;
    pub const CARD_NOT_FOUND: i32 = 4004;
    pub const CONFLICT: i32 = 4009;

    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let json = serde_json::to_value(ApiResponse::success(vec![1, 2])).unwrap();
        assert_eq!(json["code"], 0);
        assert_eq!(json["msg"], "ok");
        assert_eq!(json["data"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_error_envelope_omits_data() {
        let body = ApiResponse::<()>::error(error_codes::TRANSACTION_NOT_FOUND, "Transaction not found");
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["code"], 4002);
        assert!(json.get("data").is_none());
    }
}
