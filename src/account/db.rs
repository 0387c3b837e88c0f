//! PostgreSQL credential store (`accounts_tb`)

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::core_types::{AccountId, MinorUnits, Timestamp};
use crate::token::{StoredToken, TokenHash};
use crate::transaction::StoreError;

use super::models::{AccountRecord, NewAccount};
use super::store::CredentialStore;

const COLUMNS: &str = "account_id, first_name, last_name, user_name, email, password_hash, \
     balance, verified, email_token_hash, email_token_expiry, reset_token_hash, \
     reset_token_expiry, created_at, updated_at";

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn token_pair(hash: Option<String>, expiry: Option<Timestamp>) -> Option<StoredToken> {
    match (hash, expiry) {
        (Some(hash), Some(expires_at)) => Some(StoredToken {
            hash: TokenHash::from_stored(hash.trim()),
            expires_at,
        }),
        _ => None,
    }
}

fn row_to_record(row: &PgRow) -> Result<AccountRecord, StoreError> {
    let balance: i64 = row.try_get("balance")?;
    Ok(AccountRecord {
        id: row.try_get("account_id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        user_name: row.try_get("user_name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        balance: MinorUnits::try_from(balance)
            .map_err(|_| StoreError::Corrupt(format!("negative balance: {}", balance)))?,
        verified: row.try_get("verified")?,
        email_token: token_pair(row.try_get("email_token_hash")?, row.try_get("email_token_expiry")?),
        reset_token: token_pair(row.try_get("reset_token_hash")?, row.try_get("reset_token_expiry")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert_account(&self, new: NewAccount, now: Timestamp) -> Result<AccountRecord, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO accounts_tb
                (first_name, last_name, user_name, email, password_hash,
                 email_token_hash, email_token_expiry, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.user_name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.email_token.hash.as_str())
        .bind(new.email_token.expires_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        row_to_record(&row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>, StoreError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM accounts_tb WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<AccountRecord>, StoreError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM accounts_tb WHERE account_id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn consume_email_token(
        &self,
        hash: &TokenHash,
        now: Timestamp,
    ) -> Result<Option<AccountRecord>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE accounts_tb
            SET verified = TRUE, email_token_hash = NULL, email_token_expiry = NULL, updated_at = $2
            WHERE email_token_hash = $1 AND email_token_expiry > $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(hash.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn set_email_token(
        &self,
        id: AccountId,
        token: StoredToken,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts_tb
            SET email_token_hash = $2, email_token_expiry = $3, updated_at = $4
            WHERE account_id = $1 AND verified = FALSE
            "#,
        )
        .bind(id)
        .bind(token.hash.as_str())
        .bind(token.expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_reset_token(
        &self,
        id: AccountId,
        token: StoredToken,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts_tb
            SET reset_token_hash = $2, reset_token_expiry = $3, updated_at = $4
            WHERE account_id = $1
            "#,
        )
        .bind(id)
        .bind(token.hash.as_str())
        .bind(token.expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn consume_reset_token(
        &self,
        hash: &TokenHash,
        password_hash: String,
        now: Timestamp,
    ) -> Result<Option<AccountRecord>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE accounts_tb
            SET password_hash = $3, reset_token_hash = NULL, reset_token_expiry = NULL, updated_at = $2
            WHERE reset_token_hash = $1 AND reset_token_expiry > $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(hash.as_str())
        .bind(now)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_record).transpose()
    }
}
