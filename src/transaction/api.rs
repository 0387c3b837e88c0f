//! Transaction API types
//!
//! Request/response DTOs exchanged with the gateway. Amounts travel as
//! decimal strings and are converted to minor units here, before the
//! coordinator sees them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core_types::{AccountId, CURRENCY_DECIMALS, MinorUnits};
use crate::money::{ClientAmount, format_amount};

use super::error::TransactionError;
use super::types::Transaction;

// ============================================================================
// Requests
// ============================================================================

/// Body of `POST /transactions/send`
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMoneyRequest {
    /// Receiver email
    #[schema(example = "bob@example.com")]
    pub email: String,
    /// Decimal amount, string or number
    #[schema(value_type = String, example = "25.00")]
    pub amount: ClientAmount,
    #[serde(default)]
    #[schema(example = "Dinner split")]
    pub description: Option<String>,
}

impl SendMoneyRequest {
    pub fn amount_minor(&self) -> Result<MinorUnits, TransactionError> {
        Ok(self.amount.to_minor()?)
    }
}

/// Body of `POST /transactions/request`
#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestMoneyRequest {
    /// Email of the account asked to pay
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[schema(value_type = String, example = "10.50")]
    pub amount: ClientAmount,
    #[serde(default)]
    pub description: Option<String>,
}

impl RequestMoneyRequest {
    pub fn amount_minor(&self) -> Result<MinorUnits, TransactionError> {
        Ok(self.amount.to_minor()?)
    }
}

/// Body of the mock deposit endpoint
#[derive(Debug, Deserialize, ToSchema)]
pub struct DepositRequest {
    #[schema(value_type = String, example = "1000.00")]
    pub amount: ClientAmount,
}

impl DepositRequest {
    pub fn amount_minor(&self) -> Result<MinorUnits, TransactionError> {
        Ok(self.amount.to_minor()?)
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Client view of a transaction. Never carries the verification token.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionView {
    pub id: String,
    pub from: AccountId,
    pub to: AccountId,
    /// Decimal string, 2 places
    pub amount: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Unix milliseconds
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&Transaction> for TransactionView {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            from: tx.from,
            to: tx.to,
            amount: format_amount(tx.amount, CURRENCY_DECIMALS),
            description: tx.description.clone(),
            tx_type: tx.tx_type.as_str().to_string(),
            status: tx.status.as_str().to_string(),
            failure_reason: tx.failure_reason.map(|r| r.as_str().to_string()),
            created_at: tx.created_at.timestamp_millis(),
            updated_at: tx.updated_at.timestamp_millis(),
        }
    }
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self::from(&tx)
    }
}

/// Acknowledgement for asynchronous steps (send, verify, approve)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionAccepted {
    pub id: String,
    pub status: String,
    pub message: String,
}

impl TransactionAccepted {
    pub fn new(tx: &Transaction, message: impl Into<String>) -> Self {
        Self {
            id: tx.id.to_string(),
            status: tx.status.as_str().to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{StoredToken, TokenService};
    use crate::transaction::state::{TransactionStatus, TransactionType};
    use crate::transaction::types::TransactionId;
    use chrono::Utc;

    #[test]
    fn test_send_request_parses_string_and_number() {
        let req: SendMoneyRequest =
            serde_json::from_str(r#"{"email":"b@example.com","amount":"12.5"}"#).unwrap();
        assert_eq!(req.amount_minor().unwrap(), 1250);
        assert_eq!(req.description, None);

        let req: SendMoneyRequest =
            serde_json::from_str(r#"{"email":"b@example.com","amount":3,"description":"lunch!"}"#)
                .unwrap();
        assert_eq!(req.amount_minor().unwrap(), 300);
    }

    #[test]
    fn test_zero_amount_is_invalid() {
        let req: RequestMoneyRequest =
            serde_json::from_str(r#"{"email":"a@example.com","amount":"0"}"#).unwrap();
        assert!(matches!(req.amount_minor(), Err(TransactionError::InvalidAmount)));
    }

    #[test]
    fn test_view_hides_token() {
        let now = Utc::now();
        let tx = Transaction {
            id: TransactionId::new(),
            from: 1,
            to: 2,
            amount: 30_000,
            description: Some("rent share".into()),
            tx_type: TransactionType::Transfer,
            status: TransactionStatus::Pending,
            verification: Some(StoredToken {
                hash: TokenService::hash("ab"),
                expires_at: now,
            }),
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(TransactionView::from(&tx)).unwrap();
        assert_eq!(json["amount"], "300.00");
        assert_eq!(json["type"], "TRANSFER");
        assert_eq!(json["status"], "PENDING");
        assert!(json.get("failure_reason").is_none());
        assert!(!json.to_string().contains(tx.verification.unwrap().hash.as_str()));
    }
}
