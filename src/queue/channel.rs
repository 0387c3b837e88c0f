//! In-process job broker
//!
//! One bounded tokio mpsc channel per queue. `enqueue` never waits: a full
//! or closed channel is reported to the producer immediately.

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error};

use async_trait::async_trait;

use super::{Envelope, Job, JobId, JobQueue, QueueError, QueueName};

/// Producer side, cheap to clone
#[derive(Clone)]
pub struct ChannelQueue {
    email: mpsc::Sender<Envelope>,
    settlement: mpsc::Sender<Envelope>,
    notification: mpsc::Sender<Envelope>,
}

/// Consumer side: one receiver per queue, handed to the workers
pub struct JobReceivers {
    pub email: mpsc::Receiver<Envelope>,
    pub settlement: mpsc::Receiver<Envelope>,
    pub notification: mpsc::Receiver<Envelope>,
}

impl ChannelQueue {
    /// Create the three queues with `capacity` slots each
    pub fn new(capacity: usize) -> (Self, JobReceivers) {
        let capacity = capacity.max(1);
        let (email_tx, email_rx) = mpsc::channel(capacity);
        let (settlement_tx, settlement_rx) = mpsc::channel(capacity);
        let (notification_tx, notification_rx) = mpsc::channel(capacity);

        (
            Self {
                email: email_tx,
                settlement: settlement_tx,
                notification: notification_tx,
            },
            JobReceivers {
                email: email_rx,
                settlement: settlement_rx,
                notification: notification_rx,
            },
        )
    }

    /// Raw sender of one queue (workers use a weak clone for redelivery)
    pub fn sender(&self, queue: QueueName) -> &mpsc::Sender<Envelope> {
        match queue {
            QueueName::Email => &self.email,
            QueueName::Settlement => &self.settlement,
            QueueName::Notification => &self.notification,
        }
    }

    /// Jobs waiting in `queue`
    pub fn depth(&self, queue: QueueName) -> usize {
        let sender = self.sender(queue);
        sender.max_capacity() - sender.capacity()
    }
}

#[async_trait]
impl JobQueue for ChannelQueue {
    async fn enqueue(&self, job: Job) -> Result<JobId, QueueError> {
        let queue = job.queue();
        let envelope = Envelope {
            id: JobId::new(),
            job,
            attempt: 1,
            enqueued_at: Utc::now(),
        };
        let id = envelope.id;

        match self.sender(queue).try_send(envelope) {
            Ok(()) => {
                debug!(queue = %queue, job_id = %id, "Job enqueued");
                Ok(id)
            }
            Err(TrySendError::Full(_)) => {
                error!(queue = %queue, "Enqueue failed: queue full");
                Err(QueueError::Full(queue.to_string()))
            }
            Err(TrySendError::Closed(_)) => {
                error!(queue = %queue, "Enqueue failed: queue closed");
                Err(QueueError::Unavailable(queue.to_string()))
            }
        }
    }
}
