//! Transaction core types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, MinorUnits, Timestamp};
use crate::token::StoredToken;

use super::state::{FailureReason, TransactionStatus, TransactionType};

/// Minimum length of a description, when one is given
pub const MIN_DESCRIPTION_LEN: usize = 5;

/// Transaction ID - ULID, so ids sort by creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(ulid::Ulid);

impl TransactionId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

/// Ledger view of an account: the subset the state machine needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub first_name: String,
    pub balance: MinorUnits,
    /// Only verified accounts may send or receive
    pub verified: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum AccountLookup<'a> {
    Id(AccountId),
    Email(&'a str),
}

/// A ledger record.
///
/// The verification token is never serialized: cached lists and API
/// responses must not carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: MinorUnits,
    pub description: Option<String>,
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    #[serde(skip)]
    pub verification: Option<StoredToken>,
    pub failure_reason: Option<FailureReason>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Transaction {
    pub fn involves(&self, account: AccountId) -> bool {
        self.from == account || self.to == account
    }

    /// Party that proves intent with the emailed token.
    ///
    /// For a transfer that is the sender; for a request it is the requester
    /// who approves it.
    pub fn initiator(&self) -> AccountId {
        match self.tx_type {
            TransactionType::Request => self.to,
            _ => self.from,
        }
    }
}

/// Fields for [`LedgerStore::create_transaction`](super::store::LedgerStore::create_transaction)
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: MinorUnits,
    pub description: Option<String>,
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub verification: Option<StoredToken>,
}

/// Partial update. `None` leaves a field untouched; `verification:
/// Some(None)` clears the token.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub status: Option<TransactionStatus>,
    pub verification: Option<Option<StoredToken>>,
    pub failure_reason: Option<FailureReason>,
}

impl TransactionPatch {
    pub fn status(status: TransactionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn fail(reason: FailureReason) -> Self {
        Self {
            status: Some(TransactionStatus::Failed),
            verification: Some(None),
            failure_reason: Some(reason),
        }
    }

    pub fn with_token(mut self, token: StoredToken) -> Self {
        self.verification = Some(Some(token));
        self
    }

    /// Apply to an in-memory record (stores without native partial updates)
    pub fn apply(&self, tx: &mut Transaction, now: Timestamp) {
        if let Some(status) = self.status {
            tx.status = status;
        }
        if let Some(verification) = &self.verification {
            tx.verification = verification.clone();
        }
        if let Some(reason) = self.failure_reason {
            tx.failure_reason = Some(reason);
        }
        tx.updated_at = now;
    }
}

/// Per-user list views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListQuery {
    /// COMPLETED transactions where the user is sender or receiver
    Completed(AccountId),
    /// REQUEST transactions the user raised (`to = user`)
    Requested(AccountId),
}

impl ListQuery {
    pub fn account(&self) -> AccountId {
        match self {
            ListQuery::Completed(id) | ListQuery::Requested(id) => *id,
        }
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        match *self {
            ListQuery::Completed(user) => {
                tx.status == TransactionStatus::Completed && tx.involves(user)
            }
            ListQuery::Requested(user) => tx.tx_type == TransactionType::Request && tx.to == user,
        }
    }
}

/// Result of a verification token consumption: the transaction now in
/// QUEUED plus the token that was cleared (kept for compensation).
#[derive(Debug, Clone)]
pub struct ConsumedVerification {
    pub transaction: Transaction,
    pub token: StoredToken,
}

/// Result of [`LedgerStore::apply_settlement`](super::store::LedgerStore::apply_settlement)
#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    Completed(Transaction),
    Failed(Transaction),
    /// Not in QUEUED (already settled or never verified); nothing changed
    Skipped(Transaction),
}

/// Settlement preconditions, re-checked at execution time.
///
/// Every store runs this inside the same critical section that moves the
/// balances, so the check and the mutation cannot be interleaved.
pub fn settlement_verdict(
    tx: &Transaction,
    sender: &Account,
    receiver: &Account,
) -> Result<(), FailureReason> {
    if !sender.verified {
        return Err(FailureReason::SenderNotVerified);
    }
    if !receiver.verified {
        return Err(FailureReason::ReceiverNotVerified);
    }
    if sender.balance < tx.amount {
        return Err(FailureReason::InsufficientBalance);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account(id: AccountId, balance: MinorUnits, verified: bool) -> Account {
        Account {
            id,
            email: format!("user{}@example.com", id),
            first_name: format!("user{}", id),
            balance,
            verified,
        }
    }

    fn tx(from: AccountId, to: AccountId, amount: MinorUnits, tx_type: TransactionType) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: TransactionId::new(),
            from,
            to,
            amount,
            description: None,
            tx_type,
            status: TransactionStatus::Queued,
            verification: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_transaction_id_parse() {
        let id = TransactionId::new();
        let parsed: TransactionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-ulid".parse::<TransactionId>().is_err());
    }

    #[test]
    fn test_settlement_verdict() {
        let t = tx(1, 2, 300, TransactionType::Transfer);
        assert!(settlement_verdict(&t, &account(1, 1000, true), &account(2, 0, true)).is_ok());
        assert_eq!(
            settlement_verdict(&t, &account(1, 100, true), &account(2, 0, true)),
            Err(FailureReason::InsufficientBalance)
        );
        assert_eq!(
            settlement_verdict(&t, &account(1, 1000, true), &account(2, 0, false)),
            Err(FailureReason::ReceiverNotVerified)
        );
        assert_eq!(
            settlement_verdict(&t, &account(1, 1000, false), &account(2, 0, true)),
            Err(FailureReason::SenderNotVerified)
        );
    }

    #[test]
    fn test_initiator() {
        assert_eq!(tx(1, 2, 1, TransactionType::Transfer).initiator(), 1);
        assert_eq!(tx(1, 2, 1, TransactionType::Request).initiator(), 2);
    }

    #[test]
    fn test_list_query_matches() {
        let mut completed = tx(1, 2, 5, TransactionType::Transfer);
        completed.status = TransactionStatus::Completed;
        assert!(ListQuery::Completed(1).matches(&completed));
        assert!(ListQuery::Completed(2).matches(&completed));
        assert!(!ListQuery::Completed(3).matches(&completed));

        let request = tx(1, 2, 5, TransactionType::Request);
        assert!(ListQuery::Requested(2).matches(&request));
        assert!(!ListQuery::Requested(1).matches(&request));
    }

    #[test]
    fn test_patch_fail_clears_token() {
        let now = Utc::now();
        let mut t = tx(1, 2, 5, TransactionType::Transfer);
        t.status = TransactionStatus::Pending;
        t.verification = Some(StoredToken {
            hash: crate::token::TokenService::hash("x"),
            expires_at: now,
        });

        TransactionPatch::fail(FailureReason::Rejected).apply(&mut t, now);
        assert_eq!(t.status, TransactionStatus::Failed);
        assert!(t.verification.is_none());
        assert_eq!(t.failure_reason, Some(FailureReason::Rejected));
    }

    #[test]
    fn test_serialization_omits_token() {
        let mut t = tx(1, 2, 5, TransactionType::Transfer);
        t.verification = Some(StoredToken {
            hash: crate::token::TokenService::hash("secret"),
            expires_at: Utc::now(),
        });
        let json = serde_json::to_string(&t).unwrap();
        assert!(!json.contains(t.verification.as_ref().unwrap().hash.as_str()));
    }
}
