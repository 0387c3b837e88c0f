//! Ledger Store contract
//!
//! Durable account balances and transaction records. Two implementations:
//! [`MemoryLedger`](super::memory::MemoryLedger) for tests and single-node dev,
//! [`PgLedgerStore`](super::db::PgLedgerStore) for production.
//!
//! # Atomicity requirements
//!
//! - `record_deposit` credits the balance and inserts the COMPLETED DEPOSIT
//!   row together, or does neither.
//! - `update_transaction` with `expected` is a compare-and-swap on status.
//! - `consume_verification` matches hash, expiry and PENDING status and clears
//!   the token in one conditional write. Two concurrent calls with the same
//!   hash yield exactly one `Some`.
//! - `apply_settlement` re-checks preconditions and moves both balances under
//!   the same per-account serialization, so two settlements sharing a sender
//!   cannot both pass the balance check.

use async_trait::async_trait;
use thiserror::Error;

use crate::core_types::{AccountId, MinorUnits, Timestamp};
use crate::token::TokenHash;

use super::state::TransactionStatus;
use super::types::{
    Account, AccountLookup, ConsumedVerification, ListQuery, NewTransaction, SettlementOutcome,
    Transaction, TransactionId, TransactionPatch,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Account not found")]
    AccountNotFound,

    /// Unique constraint or similar violation
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Stored data could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_unique_violation()
        {
            return StoreError::Conflict(db_err.message().to_string());
        }
        StoreError::Database(e.to_string())
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_account(&self, lookup: AccountLookup<'_>) -> Result<Option<Account>, StoreError>;

    /// Credit `amount` and record it as a COMPLETED DEPOSIT in one write
    async fn record_deposit(
        &self,
        id: AccountId,
        amount: MinorUnits,
        now: Timestamp,
    ) -> Result<Transaction, StoreError>;

    async fn create_transaction(
        &self,
        new: NewTransaction,
        now: Timestamp,
    ) -> Result<Transaction, StoreError>;

    async fn find_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;

    /// Apply `patch`; when `expected` is given, only if the current status
    /// matches. `None` means no row matched.
    async fn update_transaction(
        &self,
        id: TransactionId,
        patch: TransactionPatch,
        expected: Option<TransactionStatus>,
        now: Timestamp,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Single conditional PENDING→QUEUED transition keyed by token hash
    async fn consume_verification(
        &self,
        hash: &TokenHash,
        now: Timestamp,
    ) -> Result<Option<ConsumedVerification>, StoreError>;

    /// Settle a QUEUED transaction: COMPLETED with both balances moved, or
    /// FAILED with balances untouched. `None` when the id is unknown.
    async fn apply_settlement(
        &self,
        id: TransactionId,
        now: Timestamp,
    ) -> Result<Option<SettlementOutcome>, StoreError>;

    /// Newest first
    async fn list_transactions(&self, query: ListQuery) -> Result<Vec<Transaction>, StoreError>;

    /// QUEUED transactions last touched before `updated_before`, oldest first
    async fn find_stale_queued(
        &self,
        updated_before: Timestamp,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// PENDING transactions holding a token whose expiry is at or before `now`
    async fn find_expired_pending(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError>;
}
