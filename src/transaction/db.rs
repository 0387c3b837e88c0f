//! PostgreSQL Ledger Store
//!
//! Every state change is a conditional UPDATE (CAS on status) or runs inside
//! a transaction holding row locks. Settlement locks the transaction row, then
//! both account rows in id order.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::core_types::{AccountId, MinorUnits, Timestamp};
use crate::token::{StoredToken, TokenHash};

use super::state::{FailureReason, TransactionStatus, TransactionType};
use super::store::{LedgerStore, StoreError};
use super::types::{
    Account, AccountLookup, ConsumedVerification, ListQuery, NewTransaction, SettlementOutcome,
    Transaction, TransactionId, TransactionPatch, settlement_verdict,
};

const TX_COLUMNS: &str = "transaction_id, from_account, to_account, amount, description, \
     tx_type, status, verification_token_hash, verification_expiry, failure_reason, \
     created_at, updated_at";

const ACCOUNT_COLUMNS: &str = "account_id, email, first_name, balance, verified";

pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_account(row: &PgRow) -> Result<Account, StoreError> {
    let balance: i64 = row.try_get("balance").map_err(StoreError::from)?;
    Ok(Account {
        id: row.try_get("account_id")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        balance: MinorUnits::try_from(balance)
            .map_err(|_| StoreError::Corrupt(format!("negative balance: {}", balance)))?,
        verified: row.try_get("verified")?,
    })
}

fn row_to_transaction(row: &PgRow) -> Result<Transaction, StoreError> {
    let id_str: String = row.try_get("transaction_id")?;
    let id: TransactionId = id_str
        .trim()
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("invalid transaction_id: {}", id_str)))?;

    let status_id: i16 = row.try_get("status")?;
    let status = TransactionStatus::from_id(status_id)
        .ok_or_else(|| StoreError::Corrupt(format!("invalid status id: {}", status_id)))?;

    let type_id: i16 = row.try_get("tx_type")?;
    let tx_type = TransactionType::from_id(type_id)
        .ok_or_else(|| StoreError::Corrupt(format!("invalid tx_type id: {}", type_id)))?;

    let amount: i64 = row.try_get("amount")?;
    let amount = MinorUnits::try_from(amount)
        .map_err(|_| StoreError::Corrupt(format!("negative amount on {}", id)))?;

    let hash: Option<String> = row.try_get("verification_token_hash")?;
    let expiry: Option<Timestamp> = row.try_get("verification_expiry")?;
    let verification = match (hash, expiry) {
        (Some(hash), Some(expires_at)) => Some(StoredToken {
            hash: TokenHash::from_stored(hash.trim()),
            expires_at,
        }),
        _ => None,
    };

    let failure_reason: Option<String> = row.try_get("failure_reason")?;
    let failure_reason = match failure_reason {
        Some(raw) => Some(
            FailureReason::parse(&raw)
                .ok_or_else(|| StoreError::Corrupt(format!("invalid failure_reason: {}", raw)))?,
        ),
        None => None,
    };

    Ok(Transaction {
        id,
        from: row.try_get("from_account")?,
        to: row.try_get("to_account")?,
        amount,
        description: row.try_get("description")?,
        tx_type,
        status,
        verification,
        failure_reason,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn rows_to_transactions(rows: &[PgRow]) -> Result<Vec<Transaction>, StoreError> {
    rows.iter().map(row_to_transaction).collect()
}

fn amount_to_db(amount: MinorUnits) -> Result<i64, StoreError> {
    i64::try_from(amount).map_err(|_| StoreError::Conflict("amount exceeds BIGINT".into()))
}

async fn insert_transaction<'e, E>(
    executor: E,
    new: &NewTransaction,
    now: Timestamp,
) -> Result<Transaction, StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    let id = TransactionId::new();
    let (hash, expiry) = match &new.verification {
        Some(token) => (Some(token.hash.as_str().to_string()), Some(token.expires_at)),
        None => (None, None),
    };

    let row = sqlx::query(&format!(
        r#"
        INSERT INTO transactions_tb
            (transaction_id, from_account, to_account, amount, description, tx_type, status,
             verification_token_hash, verification_expiry, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
        RETURNING {}
        "#,
        TX_COLUMNS
    ))
    .bind(id.to_string())
    .bind(new.from)
    .bind(new.to)
    .bind(amount_to_db(new.amount)?)
    .bind(&new.description)
    .bind(new.tx_type.id())
    .bind(new.status.id())
    .bind(hash)
    .bind(expiry)
    .bind(now)
    .fetch_one(executor)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StoreError::AccountNotFound,
        _ => StoreError::from(e),
    })?;

    row_to_transaction(&row)
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn find_account(&self, lookup: AccountLookup<'_>) -> Result<Option<Account>, StoreError> {
        let row = match lookup {
            AccountLookup::Id(id) => {
                sqlx::query(&format!(
                    "SELECT {} FROM accounts_tb WHERE account_id = $1",
                    ACCOUNT_COLUMNS
                ))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            AccountLookup::Email(email) => {
                sqlx::query(&format!(
                    "SELECT {} FROM accounts_tb WHERE email = $1",
                    ACCOUNT_COLUMNS
                ))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.as_ref().map(row_to_account).transpose()
    }

    async fn record_deposit(
        &self,
        id: AccountId,
        amount: MinorUnits,
        now: Timestamp,
    ) -> Result<Transaction, StoreError> {
        let mut db_tx = self.pool.begin().await?;

        let credited = sqlx::query(
            "UPDATE accounts_tb SET balance = balance + $1, updated_at = $3 WHERE account_id = $2",
        )
        .bind(amount_to_db(amount)?)
        .bind(id)
        .bind(now)
        .execute(&mut *db_tx)
        .await?;
        if credited.rows_affected() == 0 {
            return Err(StoreError::AccountNotFound);
        }

        let tx = insert_transaction(
            &mut *db_tx,
            &NewTransaction {
                from: id,
                to: id,
                amount,
                description: Some("Deposit".to_string()),
                tx_type: TransactionType::Deposit,
                status: TransactionStatus::Completed,
                verification: None,
            },
            now,
        )
        .await?;

        db_tx.commit().await?;
        Ok(tx)
    }

    async fn create_transaction(
        &self,
        new: NewTransaction,
        now: Timestamp,
    ) -> Result<Transaction, StoreError> {
        insert_transaction(&self.pool, &new, now).await
    }

    async fn find_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM transactions_tb WHERE transaction_id = $1",
            TX_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn update_transaction(
        &self,
        id: TransactionId,
        patch: TransactionPatch,
        expected: Option<TransactionStatus>,
        now: Timestamp,
    ) -> Result<Option<Transaction>, StoreError> {
        let touch_token = patch.verification.is_some();
        let (hash, expiry) = match patch.verification.as_ref().and_then(|v| v.as_ref()) {
            Some(token) => (Some(token.hash.as_str().to_string()), Some(token.expires_at)),
            None => (None, None),
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE transactions_tb SET
                status = COALESCE($2, status),
                verification_token_hash = CASE WHEN $3 THEN $4 ELSE verification_token_hash END,
                verification_expiry = CASE WHEN $3 THEN $5 ELSE verification_expiry END,
                failure_reason = COALESCE($6, failure_reason),
                updated_at = $7
            WHERE transaction_id = $1
              AND ($8::SMALLINT IS NULL OR status = $8)
            RETURNING {}
            "#,
            TX_COLUMNS
        ))
        .bind(id.to_string())
        .bind(patch.status.map(|s| s.id()))
        .bind(touch_token)
        .bind(hash)
        .bind(expiry)
        .bind(patch.failure_reason.map(|r| r.as_str()))
        .bind(now)
        .bind(expected.map(|s| s.id()))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn consume_verification(
        &self,
        hash: &TokenHash,
        now: Timestamp,
    ) -> Result<Option<ConsumedVerification>, StoreError> {
        // The locking subquery makes a concurrent second caller re-check the
        // row after the first commit, at which point the hash no longer matches.
        let row = sqlx::query(&format!(
            r#"
            WITH matched AS (
                SELECT transaction_id, verification_expiry AS consumed_expiry
                FROM transactions_tb
                WHERE verification_token_hash = $1
                  AND status = $2
                  AND verification_expiry > $3
                FOR UPDATE
            )
            UPDATE transactions_tb t SET
                status = $4,
                verification_token_hash = NULL,
                verification_expiry = NULL,
                updated_at = $3
            FROM matched
            WHERE t.transaction_id = matched.transaction_id
            RETURNING {}, matched.consumed_expiry
            "#,
            TX_COLUMNS
                .split(", ")
                .map(|c| format!("t.{}", c.trim()))
                .collect::<Vec<_>>()
                .join(", ")
        ))
        .bind(hash.as_str())
        .bind(TransactionStatus::Pending.id())
        .bind(now)
        .bind(TransactionStatus::Queued.id())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let transaction = row_to_transaction(&row)?;
        let expires_at: Timestamp = row.try_get("consumed_expiry")?;

        Ok(Some(ConsumedVerification {
            transaction,
            token: StoredToken {
                hash: hash.clone(),
                expires_at,
            },
        }))
    }

    async fn apply_settlement(
        &self,
        id: TransactionId,
        now: Timestamp,
    ) -> Result<Option<SettlementOutcome>, StoreError> {
        let mut db_tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM transactions_tb WHERE transaction_id = $1 FOR UPDATE",
            TX_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&mut *db_tx)
        .await?;

        let Some(row) = row else {
            db_tx.rollback().await?;
            return Ok(None);
        };
        let tx = row_to_transaction(&row)?;
        if tx.status != TransactionStatus::Queued {
            db_tx.rollback().await?;
            return Ok(Some(SettlementOutcome::Skipped(tx)));
        }

        // Lock both accounts in id order to avoid deadlocks between
        // settlements running in opposite directions.
        let account_rows = sqlx::query(&format!(
            "SELECT {} FROM accounts_tb WHERE account_id = ANY($1) ORDER BY account_id FOR UPDATE",
            ACCOUNT_COLUMNS
        ))
        .bind(vec![tx.from, tx.to])
        .fetch_all(&mut *db_tx)
        .await?;

        let accounts = account_rows
            .iter()
            .map(row_to_account)
            .collect::<Result<Vec<_>, _>>()?;
        let sender = accounts
            .iter()
            .find(|a| a.id == tx.from)
            .ok_or(StoreError::AccountNotFound)?;
        let receiver = accounts
            .iter()
            .find(|a| a.id == tx.to)
            .ok_or(StoreError::AccountNotFound)?;

        let (status, reason) = match settlement_verdict(&tx, sender, receiver) {
            Ok(()) => {
                let amount = amount_to_db(tx.amount)?;
                sqlx::query(
                    "UPDATE accounts_tb SET balance = balance - $1, updated_at = $3 WHERE account_id = $2",
                )
                .bind(amount)
                .bind(tx.from)
                .bind(now)
                .execute(&mut *db_tx)
                .await?;
                sqlx::query(
                    "UPDATE accounts_tb SET balance = balance + $1, updated_at = $3 WHERE account_id = $2",
                )
                .bind(amount)
                .bind(tx.to)
                .bind(now)
                .execute(&mut *db_tx)
                .await?;
                (TransactionStatus::Completed, None)
            }
            Err(reason) => (TransactionStatus::Failed, Some(reason)),
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE transactions_tb
            SET status = $2, failure_reason = $3, updated_at = $4
            WHERE transaction_id = $1 AND status = $5
            RETURNING {}
            "#,
            TX_COLUMNS
        ))
        .bind(id.to_string())
        .bind(status.id())
        .bind(reason.map(|r| r.as_str()))
        .bind(now)
        .bind(TransactionStatus::Queued.id())
        .fetch_one(&mut *db_tx)
        .await?;
        let settled = row_to_transaction(&row)?;

        db_tx.commit().await?;

        Ok(Some(match status {
            TransactionStatus::Completed => SettlementOutcome::Completed(settled),
            _ => SettlementOutcome::Failed(settled),
        }))
    }

    async fn list_transactions(&self, query: ListQuery) -> Result<Vec<Transaction>, StoreError> {
        let rows = match query {
            ListQuery::Completed(user) => {
                sqlx::query(&format!(
                    r#"
                    SELECT {} FROM transactions_tb
                    WHERE status = $1 AND (from_account = $2 OR to_account = $2)
                    ORDER BY created_at DESC, transaction_id DESC
                    "#,
                    TX_COLUMNS
                ))
                .bind(TransactionStatus::Completed.id())
                .bind(user)
                .fetch_all(&self.pool)
                .await?
            }
            ListQuery::Requested(user) => {
                sqlx::query(&format!(
                    r#"
                    SELECT {} FROM transactions_tb
                    WHERE tx_type = $1 AND to_account = $2
                    ORDER BY created_at DESC, transaction_id DESC
                    "#,
                    TX_COLUMNS
                ))
                .bind(TransactionType::Request.id())
                .bind(user)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows_to_transactions(&rows)
    }

    async fn find_stale_queued(
        &self,
        updated_before: Timestamp,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM transactions_tb
            WHERE status = $1 AND updated_at < $2
            ORDER BY updated_at ASC
            LIMIT $3
            "#,
            TX_COLUMNS
        ))
        .bind(TransactionStatus::Queued.id())
        .bind(updated_before)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows_to_transactions(&rows)
    }

    async fn find_expired_pending(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM transactions_tb
            WHERE status = $1
              AND verification_token_hash IS NOT NULL
              AND verification_expiry <= $2
            ORDER BY updated_at ASC
            LIMIT $3
            "#,
            TX_COLUMNS
        ))
        .bind(TransactionStatus::Pending.id())
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows_to_transactions(&rows)
    }
}
