//! Consumers for the three queues

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::email::{EmailError, EmailSender};
use crate::notification::NotificationDispatcher;
use crate::transaction::{TransactionCoordinator, TransactionError};

use super::Job;
use super::worker::{JobFailure, JobHandler};

/// `transaction-settlement` consumer
pub struct SettlementHandler {
    coordinator: Arc<TransactionCoordinator>,
}

impl SettlementHandler {
    pub fn new(coordinator: Arc<TransactionCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl JobHandler for SettlementHandler {
    async fn handle(&self, job: &Job) -> Result<(), JobFailure> {
        let Job::Settlement { transaction_id } = job else {
            return Err(JobFailure::Permanent(format!("unexpected job on settlement queue: {:?}", job.queue())));
        };

        match self.coordinator.settle_transaction(*transaction_id).await {
            Ok(status) => {
                info!(transaction_id = %transaction_id, status = %status, "Settlement job done");
                Ok(())
            }
            Err(e) if e.is_transient() => Err(JobFailure::Retry(e.to_string())),
            Err(TransactionError::TransactionNotFound) => Err(JobFailure::Permanent(format!(
                "transaction {} not found",
                transaction_id
            ))),
            Err(e) => Err(JobFailure::Permanent(e.to_string())),
        }
    }
}

/// `email` consumer: render and hand to the provider
pub struct EmailHandler {
    sender: Arc<dyn EmailSender>,
}

impl EmailHandler {
    pub fn new(sender: Arc<dyn EmailSender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl JobHandler for EmailHandler {
    async fn handle(&self, job: &Job) -> Result<(), JobFailure> {
        let Job::Email(email) = job else {
            return Err(JobFailure::Permanent(format!("unexpected job on email queue: {:?}", job.queue())));
        };

        match self.sender.send(&email.render()).await {
            Ok(()) => Ok(()),
            Err(EmailError::Unavailable(msg)) => Err(JobFailure::Retry(msg)),
            Err(e @ EmailError::Rejected(_)) => {
                warn!(template = ?email.template, error = %e, "Email rejected by provider");
                Err(JobFailure::Permanent(e.to_string()))
            }
        }
    }
}

/// `notification` consumer: persist and push to live sessions
pub struct NotificationHandler {
    dispatcher: Arc<NotificationDispatcher>,
}

impl NotificationHandler {
    pub fn new(dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl JobHandler for NotificationHandler {
    async fn handle(&self, job: &Job) -> Result<(), JobFailure> {
        let Job::Notification(new) = job else {
            return Err(JobFailure::Permanent(format!("unexpected job on notification queue: {:?}", job.queue())));
        };

        // Records carry a fresh id per delivery; a redelivered job may store a duplicate
        self.dispatcher
            .deliver(new.clone())
            .await
            .map(|_| ())
            .map_err(|e| JobFailure::Retry(e.to_string()))
    }
}
