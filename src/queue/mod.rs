//! Job Queue
//!
//! At-least-once asynchronous work dispatch. Producers only see
//! [`JobQueue::enqueue`], which fails loudly when the broker cannot take the
//! job. Consumers are [`JobWorker`]s driving a [`JobHandler`] with bounded
//! redelivery.
//!
//! ```text
//! coordinator ──enqueue──► ChannelQueue ──mpsc──► JobWorker ──► JobHandler
//!                                ▲                    │
//!                                └──── redeliver ─────┘ (Retry, attempt < max)
//! ```

pub mod channel;
pub mod handlers;
pub mod worker;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core_types::Timestamp;
use crate::email::EmailJob;
use crate::notification::NewNotification;
use crate::transaction::types::TransactionId;

pub use channel::{ChannelQueue, JobReceivers};
pub use handlers::{EmailHandler, NotificationHandler, SettlementHandler};
pub use worker::{JobFailure, JobHandler, JobWorker, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueName {
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "transaction-settlement")]
    Settlement,
    #[serde(rename = "notification")]
    Notification,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Email => "email",
            QueueName::Settlement => "transaction-settlement",
            QueueName::Notification => "notification",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job payload; the variant determines the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    Email(EmailJob),
    Settlement { transaction_id: TransactionId },
    Notification(NewNotification),
}

impl Job {
    pub fn queue(&self) -> QueueName {
        match self {
            Job::Email(_) => QueueName::Email,
            Job::Settlement { .. } => QueueName::Settlement,
            Job::Notification(_) => QueueName::Notification,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(ulid::Ulid);

impl JobId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A job in flight, with its delivery attempt counter (1-based)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: JobId,
    pub job: Job,
    pub attempt: u32,
    pub enqueued_at: Timestamp,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue {0} is full")]
    Full(String),

    #[error("Queue {0} is unavailable")]
    Unavailable(String),
}

/// Producer contract consumed by the core
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<JobId, QueueError>;
}

// ============================================================================
// Test Queue (for unit tests)
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records every accepted job; can be switched to reject per queue
    #[derive(Default)]
    pub struct RecordingQueue {
        jobs: Mutex<Vec<Job>>,
        fail_email: AtomicBool,
        fail_settlement: AtomicBool,
        fail_notification: AtomicBool,
    }

    impl RecordingQueue {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail(&self, queue: QueueName, fail: bool) {
            let flag = match queue {
                QueueName::Email => &self.fail_email,
                QueueName::Settlement => &self.fail_settlement,
                QueueName::Notification => &self.fail_notification,
            };
            flag.store(fail, Ordering::SeqCst);
        }

        pub fn jobs(&self) -> Vec<Job> {
            self.jobs.lock().unwrap().clone()
        }

        pub fn jobs_on(&self, queue: QueueName) -> Vec<Job> {
            self.jobs().into_iter().filter(|j| j.queue() == queue).collect()
        }

        pub fn emails(&self) -> Vec<EmailJob> {
            self.jobs()
                .into_iter()
                .filter_map(|j| match j {
                    Job::Email(email) => Some(email),
                    _ => None,
                })
                .collect()
        }

        pub fn settlements(&self) -> Vec<TransactionId> {
            self.jobs()
                .into_iter()
                .filter_map(|j| match j {
                    Job::Settlement { transaction_id } => Some(transaction_id),
                    _ => None,
                })
                .collect()
        }

        pub fn clear(&self) {
            self.jobs.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl JobQueue for RecordingQueue {
        async fn enqueue(&self, job: Job) -> Result<JobId, QueueError> {
            let queue = job.queue();
            let failing = match queue {
                QueueName::Email => &self.fail_email,
                QueueName::Settlement => &self.fail_settlement,
                QueueName::Notification => &self.fail_notification,
            };
            if failing.load(Ordering::SeqCst) {
                return Err(QueueError::Unavailable(queue.to_string()));
            }
            self.jobs.lock().unwrap().push(job);
            Ok(JobId::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_names() {
        assert_eq!(QueueName::Email.as_str(), "email");
        assert_eq!(QueueName::Settlement.to_string(), "transaction-settlement");
        assert_eq!(QueueName::Notification.as_str(), "notification");
    }

    #[test]
    fn test_job_routing_and_json() {
        let id = TransactionId::new();
        let job = Job::Settlement { transaction_id: id };
        assert_eq!(job.queue(), QueueName::Settlement);

        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["kind"], "settlement");
        assert_eq!(json["transaction_id"], id.to_string());

        let back: Job = serde_json::from_value(json).unwrap();
        assert_eq!(back, job);
    }
}
