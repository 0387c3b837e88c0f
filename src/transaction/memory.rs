//! In-memory Ledger Store
//!
//! All state sits behind one mutex, so every trait method is a single
//! critical section. That trivially provides the conditional-update and
//! per-account serialization guarantees of [`LedgerStore`]. The lock is
//! never held across an `.await`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::account::models::AccountRecord;
use crate::core_types::{AccountId, MinorUnits, Timestamp};
use crate::token::TokenHash;

use super::state::{TransactionStatus, TransactionType};
use super::store::{LedgerStore, StoreError};
use super::types::{
    Account, AccountLookup, ConsumedVerification, ListQuery, NewTransaction, SettlementOutcome,
    Transaction, TransactionId, TransactionPatch, settlement_verdict,
};

#[derive(Default)]
pub(crate) struct LedgerState {
    pub(crate) accounts: BTreeMap<AccountId, AccountRecord>,
    pub(crate) next_account_id: AccountId,
    pub(crate) transactions: HashMap<TransactionId, Transaction>,
}

/// Process-local ledger; also backs the account credential store
/// (`account::memory`) so both views share one set of accounts.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a ready-to-use account (no password) and return its id.
    ///
    /// Used by tests and the dev bootstrap.
    pub fn seed_account(&self, email: &str, balance: MinorUnits, verified: bool) -> AccountId {
        let mut state = self.lock();
        let id = state.allocate_account_id();
        let now = Utc::now();
        let first_name = email.split('@').next().unwrap_or(email).to_string();
        state.accounts.insert(
            id,
            AccountRecord {
                id,
                first_name: first_name.clone(),
                last_name: None,
                user_name: first_name,
                email: email.to_string(),
                password_hash: String::new(),
                balance,
                verified,
                email_token: None,
                reset_token: None,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// Flip an account's verified flag (tests use this to invalidate a
    /// receiver between verification and settlement)
    pub fn set_verified(&self, id: AccountId, verified: bool) -> bool {
        match self.lock().accounts.get_mut(&id) {
            Some(account) => {
                account.verified = verified;
                true
            }
            None => false,
        }
    }

    pub fn balance_of(&self, id: AccountId) -> Option<MinorUnits> {
        self.lock().accounts.get(&id).map(|a| a.balance)
    }
}

impl LedgerState {
    pub(crate) fn allocate_account_id(&mut self) -> AccountId {
        self.next_account_id += 1;
        self.next_account_id
    }

    fn newest_first(mut list: Vec<Transaction>) -> Vec<Transaction> {
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        list
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn find_account(&self, lookup: AccountLookup<'_>) -> Result<Option<Account>, StoreError> {
        let state = self.lock();
        let found = match lookup {
            AccountLookup::Id(id) => state.accounts.get(&id),
            AccountLookup::Email(email) => state.accounts.values().find(|a| a.email == email),
        };
        Ok(found.map(AccountRecord::ledger_view))
    }

    async fn record_deposit(
        &self,
        id: AccountId,
        amount: MinorUnits,
        now: Timestamp,
    ) -> Result<Transaction, StoreError> {
        let mut state = self.lock();
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or(StoreError::AccountNotFound)?;
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| StoreError::Conflict("balance overflow".into()))?;
        account.updated_at = now;

        let tx = Transaction {
            id: TransactionId::new(),
            from: id,
            to: id,
            amount,
            description: Some("Deposit".to_string()),
            tx_type: TransactionType::Deposit,
            status: TransactionStatus::Completed,
            verification: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };
        state.transactions.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn create_transaction(
        &self,
        new: NewTransaction,
        now: Timestamp,
    ) -> Result<Transaction, StoreError> {
        let mut state = self.lock();
        if !state.accounts.contains_key(&new.from) || !state.accounts.contains_key(&new.to) {
            return Err(StoreError::AccountNotFound);
        }

        let tx = Transaction {
            id: TransactionId::new(),
            from: new.from,
            to: new.to,
            amount: new.amount,
            description: new.description,
            tx_type: new.tx_type,
            status: new.status,
            verification: new.verification,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };
        state.transactions.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn find_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        Ok(self.lock().transactions.get(&id).cloned())
    }

    async fn update_transaction(
        &self,
        id: TransactionId,
        patch: TransactionPatch,
        expected: Option<TransactionStatus>,
        now: Timestamp,
    ) -> Result<Option<Transaction>, StoreError> {
        let mut state = self.lock();
        let Some(tx) = state.transactions.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(expected) = expected
            && tx.status != expected
        {
            return Ok(None);
        }
        patch.apply(tx, now);
        Ok(Some(tx.clone()))
    }

    async fn consume_verification(
        &self,
        hash: &TokenHash,
        now: Timestamp,
    ) -> Result<Option<ConsumedVerification>, StoreError> {
        let mut state = self.lock();
        let matched = state.transactions.values_mut().find(|tx| {
            tx.status == TransactionStatus::Pending
                && tx
                    .verification
                    .as_ref()
                    .is_some_and(|token| token.is_live_match(hash, now))
        });

        let Some(tx) = matched else {
            return Ok(None);
        };
        let Some(token) = tx.verification.take() else {
            return Ok(None);
        };
        tx.status = TransactionStatus::Queued;
        tx.updated_at = now;

        Ok(Some(ConsumedVerification {
            transaction: tx.clone(),
            token,
        }))
    }

    async fn apply_settlement(
        &self,
        id: TransactionId,
        now: Timestamp,
    ) -> Result<Option<SettlementOutcome>, StoreError> {
        let mut state = self.lock();
        let Some(tx) = state.transactions.get(&id).cloned() else {
            return Ok(None);
        };
        if tx.status != TransactionStatus::Queued {
            return Ok(Some(SettlementOutcome::Skipped(tx)));
        }

        let sender = state
            .accounts
            .get(&tx.from)
            .map(AccountRecord::ledger_view)
            .ok_or(StoreError::AccountNotFound)?;
        let receiver = state
            .accounts
            .get(&tx.to)
            .map(AccountRecord::ledger_view)
            .ok_or(StoreError::AccountNotFound)?;

        let patch = match settlement_verdict(&tx, &sender, &receiver) {
            Ok(()) => {
                let credited = receiver
                    .balance
                    .checked_add(tx.amount)
                    .ok_or_else(|| StoreError::Conflict("balance overflow".into()))?;
                if let Some(from) = state.accounts.get_mut(&tx.from) {
                    from.balance -= tx.amount;
                    from.updated_at = now;
                }
                if let Some(to) = state.accounts.get_mut(&tx.to) {
                    to.balance = credited;
                    to.updated_at = now;
                }
                TransactionPatch::status(TransactionStatus::Completed)
            }
            Err(reason) => TransactionPatch::fail(reason),
        };

        let Some(stored) = state.transactions.get_mut(&id) else {
            return Ok(None);
        };
        patch.apply(stored, now);
        let settled = stored.clone();

        Ok(Some(match settled.status {
            TransactionStatus::Completed => SettlementOutcome::Completed(settled),
            _ => SettlementOutcome::Failed(settled),
        }))
    }

    async fn list_transactions(&self, query: ListQuery) -> Result<Vec<Transaction>, StoreError> {
        let state = self.lock();
        let list = state
            .transactions
            .values()
            .filter(|tx| query.matches(tx))
            .cloned()
            .collect();
        Ok(LedgerState::newest_first(list))
    }

    async fn find_stale_queued(
        &self,
        updated_before: Timestamp,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError> {
        let state = self.lock();
        let mut stale: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|tx| tx.status == TransactionStatus::Queued && tx.updated_at < updated_before)
            .cloned()
            .collect();
        stale.sort_by_key(|tx| tx.updated_at);
        stale.truncate(limit);
        Ok(stale)
    }

    async fn find_expired_pending(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError> {
        let state = self.lock();
        let mut expired: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|tx| {
                tx.status == TransactionStatus::Pending
                    && tx.verification.as_ref().is_some_and(|t| t.is_expired(now))
            })
            .cloned()
            .collect();
        expired.sort_by_key(|tx| tx.updated_at);
        expired.truncate(limit);
        Ok(expired)
    }
}

impl MemoryLedger {
    /// Count of transactions of a given type (test assertions)
    pub fn count_transactions(&self, tx_type: TransactionType) -> usize {
        self.lock()
            .transactions
            .values()
            .filter(|tx| tx.tx_type == tx_type)
            .count()
    }
}
