//! Credential store contract

use async_trait::async_trait;

use crate::core_types::{AccountId, Timestamp};
use crate::token::{StoredToken, TokenHash};
use crate::transaction::StoreError;

use super::models::{AccountRecord, NewAccount};

/// Account persistence used by registration and login.
///
/// Token consumption follows the same rule as transaction tokens: one
/// conditional write matching hash and expiry, which also clears the token.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `Conflict` when the email or user name is taken
    async fn insert_account(&self, new: NewAccount, now: Timestamp) -> Result<AccountRecord, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>, StoreError>;

    async fn find_by_id(&self, id: AccountId) -> Result<Option<AccountRecord>, StoreError>;

    /// Mark the matching account verified and clear its email token
    async fn consume_email_token(
        &self,
        hash: &TokenHash,
        now: Timestamp,
    ) -> Result<Option<AccountRecord>, StoreError>;

    /// Overwrite the email token of an account that is still unverified.
    /// `false` when the account is gone or already verified.
    async fn set_email_token(
        &self,
        id: AccountId,
        token: StoredToken,
        now: Timestamp,
    ) -> Result<bool, StoreError>;

    /// Overwrite any previous reset token
    async fn set_reset_token(
        &self,
        id: AccountId,
        token: StoredToken,
        now: Timestamp,
    ) -> Result<bool, StoreError>;

    /// Replace the password of the matching account and clear its reset token
    async fn consume_reset_token(
        &self,
        hash: &TokenHash,
        password_hash: String,
        now: Timestamp,
    ) -> Result<Option<AccountRecord>, StoreError>;
}
