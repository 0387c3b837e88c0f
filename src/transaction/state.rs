//! Transaction status and type
//!
//! One canonical enum per concept, shared by the state machine and the
//! persistence layer. Ids are stored as SMALLINT.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transaction lifecycle status
///
/// ```text
/// PENDING ──verify──► QUEUED ──settle──► COMPLETED
///    │                  │
///    │                  └──precondition fails──► FAILED
///    └──reject / token expired──────────────────► FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum TransactionStatus {
    /// Awaiting owner verification (or, for a REQUEST, approval)
    Pending = 0,
    /// Verified and handed to asynchronous settlement
    Queued = 10,
    /// Terminal: balances mutated
    Completed = 20,
    /// Terminal: settlement declined, request rejected or token expired
    Failed = -10,
}

impl TransactionStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed
        )
    }

    /// Numeric id for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransactionStatus::Pending),
            10 => Some(TransactionStatus::Queued),
            20 => Some(TransactionStatus::Completed),
            -10 => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Queued => "QUEUED",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for TransactionStatus {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        TransactionStatus::from_id(value).ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum TransactionType {
    /// Sender-initiated payment
    Transfer = 1,
    /// Receiver-initiated; `to` is the requester, `from` pays
    Request = 2,
    Withdraw = 3,
    Deposit = 4,
}

impl TransactionType {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(TransactionType::Transfer),
            2 => Some(TransactionType::Request),
            3 => Some(TransactionType::Withdraw),
            4 => Some(TransactionType::Deposit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Transfer => "TRANSFER",
            TransactionType::Request => "REQUEST",
            TransactionType::Withdraw => "WITHDRAW",
            TransactionType::Deposit => "DEPOSIT",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a transaction ended in FAILED. Persisted as `failure_reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    InsufficientBalance,
    SenderNotVerified,
    ReceiverNotVerified,
    Rejected,
    TokenExpired,
    EmailUnavailable,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::InsufficientBalance => "INSUFFICIENT_BALANCE",
            FailureReason::SenderNotVerified => "SENDER_NOT_VERIFIED",
            FailureReason::ReceiverNotVerified => "RECEIVER_NOT_VERIFIED",
            FailureReason::Rejected => "REJECTED",
            FailureReason::TokenExpired => "TOKEN_EXPIRED",
            FailureReason::EmailUnavailable => "EMAIL_UNAVAILABLE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INSUFFICIENT_BALANCE" => Some(FailureReason::InsufficientBalance),
            "SENDER_NOT_VERIFIED" => Some(FailureReason::SenderNotVerified),
            "RECEIVER_NOT_VERIFIED" => Some(FailureReason::ReceiverNotVerified),
            "REJECTED" => Some(FailureReason::Rejected),
            "TOKEN_EXPIRED" => Some(FailureReason::TokenExpired),
            "EMAIL_UNAVAILABLE" => Some(FailureReason::EmailUnavailable),
            _ => None,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(!TransactionStatus::Queued.is_terminal());
    }

    #[test]
    fn test_status_ids_are_stable() {
        assert_eq!(TransactionStatus::Pending.id(), 0);
        assert_eq!(TransactionStatus::Queued.id(), 10);
        assert_eq!(TransactionStatus::Completed.id(), 20);
        assert_eq!(TransactionStatus::Failed.id(), -10);
        assert_eq!(TransactionStatus::from_id(20), Some(TransactionStatus::Completed));
        assert!(TransactionStatus::from_id(999).is_none());
        assert!(TransactionType::from_id(0).is_none());
    }

    #[test]
    fn test_serde_matches_display() {
        let json = serde_json::to_string(&TransactionStatus::Queued).unwrap();
        assert_eq!(json, "\"QUEUED\"");
        let json = serde_json::to_string(&TransactionType::Request).unwrap();
        assert_eq!(json, "\"REQUEST\"");
        assert_eq!(TransactionType::Deposit.to_string(), "DEPOSIT");
    }

    #[test]
    fn test_failure_reason_parse() {
        for reason in [
            FailureReason::InsufficientBalance,
            FailureReason::Rejected,
            FailureReason::TokenExpired,
        ] {
            assert_eq!(FailureReason::parse(reason.as_str()), Some(reason));
        }
        assert!(FailureReason::parse("nope").is_none());
    }
}
