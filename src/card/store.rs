//! Card persistence
//!
//! Both stores apply an application and an activation as single conditional
//! writes: a PENDING row keyed by holder is overwritten in place, and
//! activation matches the live token on a PENDING row and clears it.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::core_types::{AccountId, Timestamp};
use crate::token::{StoredToken, TokenHash};
use crate::transaction::StoreError;

use super::models::{CardNumbers, CardRecord, CardStatus};

#[async_trait]
pub trait CardStore: Send + Sync {
    async fn find_by_holder(&self, holder: AccountId) -> Result<Option<CardRecord>, StoreError>;

    /// Insert a PENDING card, or overwrite the PIN and token of the holder's
    /// PENDING card. `Conflict` when the holder already has an ACTIVE card.
    async fn upsert_application(
        &self,
        holder: AccountId,
        pin_hash: String,
        token: StoredToken,
        now: Timestamp,
    ) -> Result<CardRecord, StoreError>;

    /// PENDING→ACTIVE for the card holding a live `hash`. `None` when no
    /// card matches; `Conflict` when `numbers.number` is already taken.
    async fn activate(
        &self,
        hash: &TokenHash,
        numbers: &CardNumbers,
        now: Timestamp,
    ) -> Result<Option<CardRecord>, StoreError>;
}

#[derive(Default)]
pub struct MemoryCardStore {
    cards: Mutex<HashMap<AccountId, CardRecord>>,
}

impl MemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<AccountId, CardRecord>> {
        self.cards.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CardStore for MemoryCardStore {
    async fn find_by_holder(&self, holder: AccountId) -> Result<Option<CardRecord>, StoreError> {
        Ok(self.lock().get(&holder).cloned())
    }

    async fn upsert_application(
        &self,
        holder: AccountId,
        pin_hash: String,
        token: StoredToken,
        now: Timestamp,
    ) -> Result<CardRecord, StoreError> {
        let mut cards = self.lock();
        let card = cards.entry(holder).or_insert_with(|| CardRecord {
            holder,
            status: CardStatus::Pending,
            number: None,
            issue_date: None,
            expiry_date: None,
            pin_hash: String::new(),
            verification: None,
            created_at: now,
            updated_at: now,
        });
        if card.status == CardStatus::Active {
            return Err(StoreError::Conflict("card already issued".into()));
        }
        card.pin_hash = pin_hash;
        card.verification = Some(token);
        card.updated_at = now;
        Ok(card.clone())
    }

    async fn activate(
        &self,
        hash: &TokenHash,
        numbers: &CardNumbers,
        now: Timestamp,
    ) -> Result<Option<CardRecord>, StoreError> {
        let mut cards = self.lock();
        if cards
            .values()
            .any(|c| c.number.as_deref() == Some(numbers.number.as_str()))
        {
            return Err(StoreError::Conflict("card number taken".into()));
        }
        let Some(card) = cards.values_mut().find(|c| {
            c.status == CardStatus::Pending
                && c.verification
                    .as_ref()
                    .is_some_and(|t| t.is_live_match(hash, now))
        }) else {
            return Ok(None);
        };

        card.status = CardStatus::Active;
        card.number = Some(numbers.number.clone());
        card.issue_date = Some(numbers.issue_date.clone());
        card.expiry_date = Some(numbers.expiry_date.clone());
        card.verification = None;
        card.updated_at = now;
        Ok(Some(card.clone()))
    }
}

const CARD_COLUMNS: &str = "account_id, status, card_number, issue_date, expiry_date, pin_hash, \
     token_hash, token_expiry, created_at, updated_at";

pub struct PgCardStore {
    pool: PgPool,
}

impl PgCardStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_card(row: &PgRow) -> Result<CardRecord, StoreError> {
    let status_id: i16 = row.try_get("status")?;
    let status = CardStatus::from_id(status_id)
        .ok_or_else(|| StoreError::Corrupt(format!("invalid card status: {}", status_id)))?;
    let hash: Option<String> = row.try_get("token_hash")?;
    let expiry: Option<Timestamp> = row.try_get("token_expiry")?;

    Ok(CardRecord {
        holder: row.try_get("account_id")?,
        status,
        number: row.try_get("card_number")?,
        issue_date: row.try_get("issue_date")?,
        expiry_date: row.try_get("expiry_date")?,
        pin_hash: row.try_get("pin_hash")?,
        verification: hash.zip(expiry).map(|(hash, expires_at)| StoredToken {
            hash: TokenHash::from_stored(hash),
            expires_at,
        }),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl CardStore for PgCardStore {
    async fn find_by_holder(&self, holder: AccountId) -> Result<Option<CardRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM cards_tb WHERE account_id = $1",
            CARD_COLUMNS
        ))
        .bind(holder)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_card).transpose()
    }

    async fn upsert_application(
        &self,
        holder: AccountId,
        pin_hash: String,
        token: StoredToken,
        now: Timestamp,
    ) -> Result<CardRecord, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO cards_tb (account_id, status, pin_hash, token_hash, token_expiry, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (account_id) DO UPDATE
                SET pin_hash = EXCLUDED.pin_hash,
                    token_hash = EXCLUDED.token_hash,
                    token_expiry = EXCLUDED.token_expiry,
                    updated_at = EXCLUDED.updated_at
                WHERE cards_tb.status = $2
            RETURNING {}
            "#,
            CARD_COLUMNS
        ))
        .bind(holder)
        .bind(CardStatus::Pending.id())
        .bind(pin_hash)
        .bind(token.hash.as_str())
        .bind(token.expires_at)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StoreError::AccountNotFound,
            _ => StoreError::from(e),
        })?;

        match row {
            Some(row) => row_to_card(&row),
            None => Err(StoreError::Conflict("card already issued".into())),
        }
    }

    async fn activate(
        &self,
        hash: &TokenHash,
        numbers: &CardNumbers,
        now: Timestamp,
    ) -> Result<Option<CardRecord>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE cards_tb
            SET status = $2, card_number = $3, issue_date = $4, expiry_date = $5,
                token_hash = NULL, token_expiry = NULL, updated_at = $6
            WHERE token_hash = $1 AND token_expiry > $6 AND status = $7
            RETURNING {}
            "#,
            CARD_COLUMNS
        ))
        .bind(hash.as_str())
        .bind(CardStatus::Active.id())
        .bind(&numbers.number)
        .bind(&numbers.issue_date)
        .bind(&numbers.expiry_date)
        .bind(now)
        .bind(CardStatus::Pending.id())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_card).transpose()
    }
}
