//! Notification dispatcher: persist, then fan out to live sessions

use std::sync::Arc;

use crate::core_types::{AccountId, Clock};
use crate::transaction::store::StoreError;
use crate::websocket::messages::WsMessage;

use super::models::{NewNotification, Notification, NotificationId};
use super::registry::SessionRegistry;
use super::store::NotificationStore;

pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
    registry: Arc<dyn SessionRegistry>,
    clock: Arc<dyn Clock>,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        registry: Arc<dyn SessionRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
        }
    }

    /// Store the notification and push it to every session of its user.
    ///
    /// Offline users simply find it in their list later.
    pub async fn deliver(&self, new: NewNotification) -> Result<Notification, StoreError> {
        let notification = Notification::from_new(new, self.clock.now());
        self.store.insert(&notification).await?;

        let pushed = self
            .registry
            .push(notification.user_id, &WsMessage::Notification(notification.clone()));
        tracing::debug!(
            user_id = notification.user_id,
            notification_id = %notification.id,
            sessions = pushed,
            "Notification delivered"
        );
        Ok(notification)
    }

    pub async fn list(&self, user_id: AccountId) -> Result<Vec<Notification>, StoreError> {
        self.store.list_for_user(user_id).await
    }

    pub async fn mark_read(&self, id: NotificationId, user_id: AccountId) -> Result<bool, StoreError> {
        self.store.mark_read(id, user_id).await
    }

    pub fn registry(&self) -> &Arc<dyn SessionRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::SystemClock;
    use crate::notification::models::{NotificationStatus, NotificationType};
    use crate::notification::registry::LocalSessionRegistry;
    use crate::notification::store::MemoryNotificationStore;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_deliver_persists_and_pushes() {
        let registry = Arc::new(LocalSessionRegistry::new());
        let dispatcher = NotificationDispatcher::new(
            Arc::new(MemoryNotificationStore::new()),
            registry.clone(),
            Arc::new(SystemClock),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(9, tx);

        let sent = dispatcher
            .deliver(NewNotification::new(
                9,
                NotificationType::Payment,
                NotificationStatus::Requested,
                "alice requested 5.00",
            ))
            .await
            .unwrap();

        match rx.try_recv().unwrap() {
            WsMessage::Notification(n) => assert_eq!(n.id, sent.id),
            other => panic!("unexpected message {:?}", other),
        }
        assert_eq!(dispatcher.list(9).await.unwrap().len(), 1);
        assert!(dispatcher.mark_read(sent.id, 9).await.unwrap());
    }

    #[tokio::test]
    async fn test_offline_user_still_stored() {
        let dispatcher = NotificationDispatcher::new(
            Arc::new(MemoryNotificationStore::new()),
            Arc::new(LocalSessionRegistry::new()),
            Arc::new(SystemClock),
        );
        dispatcher
            .deliver(NewNotification::new(
                3,
                NotificationType::Login,
                NotificationStatus::Completed,
                "New login",
            ))
            .await
            .unwrap();
        assert_eq!(dispatcher.list(3).await.unwrap().len(), 1);
    }
}
