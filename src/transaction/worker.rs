//! Recovery Worker
//!
//! Background sweep over transactions that the request path left behind:
//! QUEUED rows whose settlement job was lost, and PENDING rows whose
//! verification token expired.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::RecoveryConfig;

use super::coordinator::TransactionCoordinator;
use super::error::TransactionError;

/// Configuration for the recovery worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often to scan
    pub scan_interval: Duration,
    /// How long a transaction must sit in QUEUED to be re-enqueued
    pub stale_threshold: Duration,
    /// Maximum rows handled per category per scan
    pub batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(30),
            stale_threshold: Duration::from_secs(60),
            batch_size: 100,
        }
    }
}

impl From<&RecoveryConfig> for WorkerConfig {
    fn from(config: &RecoveryConfig) -> Self {
        Self {
            scan_interval: Duration::from_secs(config.scan_interval_secs.max(1)),
            stale_threshold: Duration::from_secs(config.queued_stale_secs),
            batch_size: config.batch_size.max(1),
        }
    }
}

/// Counts from one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub requeued: usize,
    pub expired: usize,
}

pub struct RecoveryWorker {
    coordinator: Arc<TransactionCoordinator>,
    config: WorkerConfig,
}

impl RecoveryWorker {
    pub fn new(coordinator: Arc<TransactionCoordinator>, config: WorkerConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    /// Run forever
    pub async fn run(&self) -> ! {
        info!(
            scan_interval_secs = self.config.scan_interval.as_secs(),
            stale_threshold_secs = self.config.stale_threshold.as_secs(),
            "Starting recovery worker"
        );

        loop {
            if let Err(e) = self.scan_and_recover().await {
                error!(error = %e, "Recovery scan failed");
            }

            tokio::time::sleep(self.config.scan_interval).await;
        }
    }

    /// One sweep: re-enqueue stale QUEUED, then fail expired PENDING
    pub async fn scan_and_recover(&self) -> Result<RecoveryReport, TransactionError> {
        let stale_after = chrono::Duration::from_std(self.config.stale_threshold)
            .map_err(|e| TransactionError::SystemError(e.to_string()))?;

        let requeued = self
            .coordinator
            .requeue_stale(stale_after, self.config.batch_size)
            .await?;
        let expired = self.coordinator.expire_pending(self.config.batch_size).await?;

        let report = RecoveryReport { requeued, expired };
        if report == RecoveryReport::default() {
            debug!("Nothing to recover");
        } else {
            info!(requeued, expired, "Recovery sweep done");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.scan_interval, Duration::from_secs(30));
        assert_eq!(config.stale_threshold, Duration::from_secs(60));
        assert_eq!(config.batch_size, 100);
    }

    #[test]
    fn test_worker_config_from_recovery_config() {
        let config = WorkerConfig::from(&RecoveryConfig {
            enabled: true,
            scan_interval_secs: 0,
            queued_stale_secs: 120,
            batch_size: 10,
        });
        assert_eq!(config.scan_interval, Duration::from_secs(1));
        assert_eq!(config.stale_threshold, Duration::from_secs(120));
        assert_eq!(config.batch_size, 10);
    }
}
