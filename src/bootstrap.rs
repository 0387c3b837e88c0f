//! Service wiring
//!
//! ```text
//!  HTTP ──▶ Gateway ──▶ TransactionCoordinator / AccountService / CardService
//!                              │ enqueue
//!                              ▼
//!                  ChannelQueue (email | settlement | notification)
//!                              │
//!                              ▼
//!                  JobWorker ×3 ──▶ EmailSender / settle / dispatcher ──▶ WebSocket
//! ```
//!
//! Storage is PostgreSQL when `postgres_url` is configured, otherwise the
//! in-memory ledger backs accounts and transactions alike, next to an in-memory card store.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::account::{AccountService, AuthSettings, CredentialStore, PgCredentialStore};
use crate::cache::{MemoryCache, TransactionListCache};
use crate::card::{CardService, CardStore, MemoryCardStore, PgCardStore};
use crate::config::AppConfig;
use crate::core_types::{Clock, SystemClock};
use crate::db::Database;
use crate::email::EmailSender;
use crate::gateway::state::AppState;
use crate::notification::{
    LocalSessionRegistry, MemoryNotificationStore, NotificationDispatcher, NotificationStore,
    PgNotificationStore, SessionRegistry,
};
use crate::queue::{
    ChannelQueue, EmailHandler, JobQueue, JobWorker, NotificationHandler, QueueName, RetryPolicy,
    SettlementHandler,
};
use crate::token::TokenService;
use crate::transaction::{
    LedgerStore, MemoryLedger, PgLedgerStore, RecoveryWorker, TransactionCoordinator, WorkerConfig,
};

/// Storage backends
pub struct Backends {
    pub ledger: Arc<dyn LedgerStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub cards: Arc<dyn CardStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub pg_db: Option<Arc<Database>>,
}

impl Backends {
    pub fn in_memory() -> Self {
        let ledger = Arc::new(MemoryLedger::new());
        Self {
            ledger: ledger.clone(),
            credentials: ledger,
            cards: Arc::new(MemoryCardStore::new()),
            notifications: Arc::new(MemoryNotificationStore::new()),
            pg_db: None,
        }
    }

    /// Connect and apply migrations
    pub async fn postgres(url: &str) -> anyhow::Result<Self> {
        let db = Database::connect(url).await?;
        db.migrate().await?;
        let pool = db.pool().clone();
        Ok(Self {
            ledger: Arc::new(PgLedgerStore::new(pool.clone())),
            credentials: Arc::new(PgCredentialStore::new(pool.clone())),
            cards: Arc::new(PgCardStore::new(pool.clone())),
            notifications: Arc::new(PgNotificationStore::new(pool)),
            pg_db: Some(Arc::new(db)),
        })
    }

    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        match &config.postgres_url {
            Some(url) => {
                info!("Using PostgreSQL storage");
                Self::postgres(url).await
            }
            None => {
                info!("No postgres_url configured, using in-memory storage");
                Ok(Self::in_memory())
            }
        }
    }
}

/// Fully wired application, workers not yet running
pub struct App {
    pub state: Arc<AppState>,
    workers: Vec<JobWorker>,
    recovery: Option<RecoveryWorker>,
    cache: Arc<MemoryCache>,
    cache_sweep: Duration,
}

impl App {
    pub fn build(config: &AppConfig, backends: Backends, email: Arc<dyn EmailSender>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let (queue, receivers) = ChannelQueue::new(config.queue.capacity);
        let producer: Arc<dyn JobQueue> = Arc::new(queue.clone());

        let cache = Arc::new(MemoryCache::with_capacity(config.cache.capacity));
        let lists = TransactionListCache::new(cache.clone(), config.cache.ttl());
        let coordinator = Arc::new(TransactionCoordinator::new(
            backends.ledger,
            TokenService::new(config.token.ttl(), clock.clone()),
            lists,
            producer.clone(),
            clock.clone(),
            config.public_base_url.clone(),
        ));
        let cards = Arc::new(CardService::new(
            backends.cards,
            backends.credentials.clone(),
            TokenService::new(config.token.ttl(), clock.clone()),
            producer.clone(),
            clock.clone(),
            config.public_base_url.clone(),
        ));
        let accounts = Arc::new(AccountService::new(
            backends.credentials,
            TokenService::new(config.token.ttl(), clock.clone()),
            producer,
            clock.clone(),
            AuthSettings::from_config(config),
        ));
        let registry: Arc<dyn SessionRegistry> = Arc::new(LocalSessionRegistry::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            backends.notifications,
            registry,
            clock,
        ));

        let policy = RetryPolicy::from(&config.queue);
        let workers = vec![
            JobWorker::new(
                QueueName::Email,
                receivers.email,
                queue.sender(QueueName::Email),
                Arc::new(EmailHandler::new(email)),
                policy.clone(),
            ),
            JobWorker::new(
                QueueName::Settlement,
                receivers.settlement,
                queue.sender(QueueName::Settlement),
                Arc::new(SettlementHandler::new(coordinator.clone())),
                policy.clone(),
            ),
            JobWorker::new(
                QueueName::Notification,
                receivers.notification,
                queue.sender(QueueName::Notification),
                Arc::new(NotificationHandler::new(dispatcher.clone())),
                policy,
            ),
        ];

        let recovery = config
            .recovery
            .enabled
            .then(|| RecoveryWorker::new(coordinator.clone(), WorkerConfig::from(&config.recovery)));

        let state = Arc::new(AppState::new(
            coordinator,
            accounts,
            cards,
            dispatcher,
            backends.pg_db,
        ));

        Self {
            state,
            workers,
            recovery,
            cache,
            cache_sweep: config.cache.sweep_interval(),
        }
    }

    /// Spawn the queue consumers and the recovery sweep on the current runtime
    pub fn spawn_workers(self) -> Arc<AppState> {
        for worker in self.workers {
            tokio::spawn(worker.run());
        }
        tokio::spawn(self.cache.run_sweeper(self.cache_sweep));
        if let Some(recovery) = self.recovery {
            tokio::spawn(async move { recovery.run().await });
        } else {
            info!("Recovery worker disabled");
        }
        self.state
    }
}
