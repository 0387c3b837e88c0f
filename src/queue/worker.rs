//! Queue consumer loop with bounded redelivery

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;

use super::{Envelope, Job, QueueName};

/// Outcome of a failed delivery
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    /// Transient; redeliver after backoff
    #[error("retryable: {0}")]
    Retry(String),

    /// Will never succeed; drop
    #[error("permanent: {0}")]
    Permanent(String),
}

/// Consumer-side handler. Must be idempotent: a job may be seen more than once.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<(), JobFailure>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Linear backoff base: attempt `n` waits `n * backoff`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(500),
        }
    }
}

impl From<&QueueConfig> for RetryPolicy {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// What happened to one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Done,
    Redelivering,
    DeadLettered,
    Dropped,
}

pub struct JobWorker {
    queue: QueueName,
    rx: mpsc::Receiver<Envelope>,
    // Weak so that the queue closes once every producer is gone
    redeliver: mpsc::WeakSender<Envelope>,
    handler: Arc<dyn JobHandler>,
    policy: RetryPolicy,
}

impl JobWorker {
    pub fn new(
        queue: QueueName,
        rx: mpsc::Receiver<Envelope>,
        redeliver: &mpsc::Sender<Envelope>,
        handler: Arc<dyn JobHandler>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            rx,
            redeliver: redeliver.downgrade(),
            handler,
            policy,
        }
    }

    /// Consume until the queue is closed
    pub async fn run(mut self) {
        info!(queue = %self.queue, max_attempts = self.policy.max_attempts, "Starting job worker");
        while let Some(envelope) = self.rx.recv().await {
            self.process(envelope).await;
        }
        info!(queue = %self.queue, "Job queue closed, worker exiting");
    }

    /// Handle one delivery
    pub async fn process(&self, envelope: Envelope) -> Disposition {
        let job_id = envelope.id;
        let attempt = envelope.attempt;

        match self.handler.handle(&envelope.job).await {
            Ok(()) => {
                debug!(queue = %self.queue, job_id = %job_id, attempt, "Job done");
                Disposition::Done
            }
            Err(JobFailure::Permanent(reason)) => {
                warn!(queue = %self.queue, job_id = %job_id, reason = %reason, "Job dropped");
                Disposition::Dropped
            }
            Err(JobFailure::Retry(reason)) if attempt >= self.policy.max_attempts => {
                error!(
                    queue = %self.queue,
                    job_id = %job_id,
                    attempts = attempt,
                    reason = %reason,
                    job = ?envelope.job,
                    "Job dead-lettered after max attempts"
                );
                Disposition::DeadLettered
            }
            Err(JobFailure::Retry(reason)) => {
                warn!(queue = %self.queue, job_id = %job_id, attempt, reason = %reason, "Job failed, will redeliver");
                self.schedule_redelivery(envelope);
                Disposition::Redelivering
            }
        }
    }

    fn schedule_redelivery(&self, mut envelope: Envelope) {
        let Some(sender) = self.redeliver.upgrade() else {
            error!(queue = %self.queue, job_id = %envelope.id, "Queue closed, cannot redeliver");
            return;
        };
        let delay = self.policy.backoff * envelope.attempt;
        envelope.attempt += 1;
        let queue = self.queue;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let job_id = envelope.id;
            if sender.send(envelope).await.is_err() {
                error!(queue = %queue, job_id = %job_id, "Redelivery failed: queue closed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{ChannelQueue, JobQueue};
    use crate::transaction::types::TransactionId;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls with `Retry`
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl JobHandler for Flaky {
        async fn handle(&self, _job: &Job) -> Result<(), JobFailure> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(JobFailure::Retry("downstream timeout".into()))
            } else {
                Ok(())
            }
        }
    }

    struct Broken;

    #[async_trait]
    impl JobHandler for Broken {
        async fn handle(&self, _job: &Job) -> Result<(), JobFailure> {
            Err(JobFailure::Permanent("bad payload".into()))
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let (queue, mut rx) = ChannelQueue::new(8);
        let handler = Arc::new(Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let worker = JobWorker::new(
            QueueName::Settlement,
            mpsc::channel(1).1,
            queue.sender(QueueName::Settlement),
            handler.clone(),
            policy(5),
        );

        queue
            .enqueue(Job::Settlement {
                transaction_id: TransactionId::new(),
            })
            .await
            .unwrap();

        let mut dispositions = Vec::new();
        for _ in 0..3 {
            let envelope = rx.settlement.recv().await.unwrap();
            dispositions.push(worker.process(envelope).await);
        }

        assert_eq!(
            dispositions,
            vec![
                Disposition::Redelivering,
                Disposition::Redelivering,
                Disposition::Done
            ]
        );
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_dead_letter_after_max_attempts() {
        let (queue, _rx) = ChannelQueue::new(8);
        let worker = JobWorker::new(
            QueueName::Email,
            mpsc::channel(1).1,
            queue.sender(QueueName::Email),
            Arc::new(Flaky {
                failures: u32::MAX,
                calls: AtomicU32::new(0),
            }),
            policy(3),
        );

        let envelope = Envelope {
            id: super::super::JobId::new(),
            job: Job::Settlement {
                transaction_id: TransactionId::new(),
            },
            attempt: 3,
            enqueued_at: chrono::Utc::now(),
        };
        assert_eq!(worker.process(envelope).await, Disposition::DeadLettered);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_dropped() {
        let (queue, _rx) = ChannelQueue::new(8);
        let worker = JobWorker::new(
            QueueName::Email,
            mpsc::channel(1).1,
            queue.sender(QueueName::Email),
            Arc::new(Broken),
            policy(3),
        );

        let envelope = Envelope {
            id: super::super::JobId::new(),
            job: Job::Settlement {
                transaction_id: TransactionId::new(),
            },
            attempt: 1,
            enqueued_at: chrono::Utc::now(),
        };
        assert_eq!(worker.process(envelope).await, Disposition::Dropped);
    }

    #[tokio::test]
    async fn test_run_exits_when_producers_dropped() {
        let (queue, rx) = ChannelQueue::new(8);
        let worker = JobWorker::new(
            QueueName::Notification,
            rx.notification,
            queue.sender(QueueName::Notification),
            Arc::new(Broken),
            policy(1),
        );
        drop(queue);
        tokio::time::timeout(Duration::from_secs(1), worker.run())
            .await
            .expect("worker should exit once the queue closes");
    }
}
