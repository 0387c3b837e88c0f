use std::sync::Arc;

use crate::account::AccountService;
use crate::card::CardService;
use crate::db::Database;
use crate::notification::{NotificationDispatcher, SessionRegistry};
use crate::transaction::TransactionCoordinator;

/// Shared gateway state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<TransactionCoordinator>,
    pub accounts: Arc<AccountService>,
    pub cards: Arc<CardService>,
    pub notifications: Arc<NotificationDispatcher>,
    /// PostgreSQL pool, checked by the health endpoint (None with in-memory stores)
    pub pg_db: Option<Arc<Database>>,
}

impl AppState {
    pub fn new(
        coordinator: Arc<TransactionCoordinator>,
        accounts: Arc<AccountService>,
        cards: Arc<CardService>,
        notifications: Arc<NotificationDispatcher>,
        pg_db: Option<Arc<Database>>,
    ) -> Self {
        Self {
            coordinator,
            accounts,
            cards,
            notifications,
            pg_db,
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionRegistry> {
        self.notifications.registry()
    }
}
