//! Notification persistence

use std::sync::RwLock;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::core_types::AccountId;
use crate::transaction::store::StoreError;

use super::models::{Notification, NotificationId, NotificationStatus, NotificationType};

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: &Notification) -> Result<(), StoreError>;

    /// Newest first
    async fn list_for_user(&self, user_id: AccountId) -> Result<Vec<Notification>, StoreError>;

    /// `false` when the notification does not exist or belongs to someone else
    async fn mark_read(&self, id: NotificationId, user_id: AccountId) -> Result<bool, StoreError>;
}

#[derive(Default)]
pub struct MemoryNotificationStore {
    items: RwLock<Vec<Notification>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, notification: &Notification) -> Result<(), StoreError> {
        self.items
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: AccountId) -> Result<Vec<Notification>, StoreError> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<Notification> = items
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn mark_read(&self, id: NotificationId, user_id: AccountId) -> Result<bool, StoreError> {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        match items.iter_mut().find(|n| n.id == id && n.user_id == user_id) {
            Some(n) => {
                n.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_notification(row: &sqlx::postgres::PgRow) -> Result<Notification, StoreError> {
        let id: String = row.try_get("notification_id")?;
        let kind: String = row.try_get("kind")?;
        let status: String = row.try_get("status")?;

        Ok(Notification {
            id: id
                .trim()
                .parse()
                .map_err(|_| StoreError::Corrupt(format!("invalid notification_id: {}", id)))?,
            user_id: row.try_get("account_id")?,
            from: row.try_get("from_account")?,
            to: row.try_get("to_account")?,
            kind: NotificationType::parse(&kind)
                .ok_or_else(|| StoreError::Corrupt(format!("invalid kind: {}", kind)))?,
            status: NotificationStatus::parse(&status)
                .ok_or_else(|| StoreError::Corrupt(format!("invalid status: {}", status)))?,
            message: row.try_get("message")?,
            read: row.try_get("read")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn insert(&self, n: &Notification) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO notifications_tb
                (notification_id, account_id, from_account, to_account, kind, status, message, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (notification_id) DO NOTHING
            "#,
        )
        .bind(n.id.to_string())
        .bind(n.user_id)
        .bind(n.from)
        .bind(n.to)
        .bind(n.kind.as_str())
        .bind(n.status.as_str())
        .bind(&n.message)
        .bind(n.read)
        .bind(n.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: AccountId) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT notification_id, account_id, from_account, to_account, kind, status, message, read, created_at
            FROM notifications_tb
            WHERE account_id = $1
            ORDER BY created_at DESC, notification_id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_notification).collect()
    }

    async fn mark_read(&self, id: NotificationId, user_id: AccountId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE notifications_tb SET read = TRUE WHERE notification_id = $1 AND account_id = $2",
        )
        .bind(id.to_string())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
