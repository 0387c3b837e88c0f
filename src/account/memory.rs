//! Credential store over the in-memory ledger

use async_trait::async_trait;

use crate::core_types::{AccountId, Timestamp};
use crate::token::{StoredToken, TokenHash};
use crate::transaction::{MemoryLedger, StoreError};

use super::models::{AccountRecord, NewAccount};
use super::store::CredentialStore;

#[async_trait]
impl CredentialStore for MemoryLedger {
    async fn insert_account(&self, new: NewAccount, now: Timestamp) -> Result<AccountRecord, StoreError> {
        let mut state = self.lock();
        if state.accounts.values().any(|a| a.email == new.email) {
            return Err(StoreError::Conflict("email already registered".into()));
        }
        if state.accounts.values().any(|a| a.user_name == new.user_name) {
            return Err(StoreError::Conflict("user name already taken".into()));
        }

        let id = state.allocate_account_id();
        let record = AccountRecord {
            id,
            first_name: new.first_name,
            last_name: new.last_name,
            user_name: new.user_name,
            email: new.email,
            password_hash: new.password_hash,
            balance: 0,
            verified: false,
            email_token: Some(new.email_token),
            reset_token: None,
            created_at: now,
            updated_at: now,
        };
        state.accounts.insert(id, record.clone());
        Ok(record)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self
            .lock()
            .accounts
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self.lock().accounts.get(&id).cloned())
    }

    async fn consume_email_token(
        &self,
        hash: &TokenHash,
        now: Timestamp,
    ) -> Result<Option<AccountRecord>, StoreError> {
        let mut state = self.lock();
        let Some(account) = state.accounts.values_mut().find(|a| {
            a.email_token
                .as_ref()
                .is_some_and(|t| t.is_live_match(hash, now))
        }) else {
            return Ok(None);
        };

        account.email_token = None;
        account.verified = true;
        account.updated_at = now;
        Ok(Some(account.clone()))
    }

    async fn set_email_token(
        &self,
        id: AccountId,
        token: StoredToken,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        match self.lock().accounts.get_mut(&id) {
            Some(account) if !account.verified => {
                account.email_token = Some(token);
                account.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_reset_token(
        &self,
        id: AccountId,
        token: StoredToken,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        match self.lock().accounts.get_mut(&id) {
            Some(account) => {
                account.reset_token = Some(token);
                account.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn consume_reset_token(
        &self,
        hash: &TokenHash,
        password_hash: String,
        now: Timestamp,
    ) -> Result<Option<AccountRecord>, StoreError> {
        let mut state = self.lock();
        let Some(account) = state.accounts.values_mut().find(|a| {
            a.reset_token
                .as_ref()
                .is_some_and(|t| t.is_live_match(hash, now))
        }) else {
            return Ok(None);
        };

        account.reset_token = None;
        account.password_hash = password_hash;
        account.updated_at = now;
        Ok(Some(account.clone()))
    }
}
