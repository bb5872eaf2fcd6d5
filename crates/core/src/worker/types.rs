use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::credentials::AccessToken;
use crate::job::{CorrelationId, JobDescriptor};

/// A decoded job on its way to the dispatcher, with the requester's token.
#[derive(Debug, Clone)]
pub struct DispatchItem {
    pub job: JobDescriptor,
    pub token: AccessToken,
}

/// Tunables of the worker.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Messages requested per pull.
    pub max_messages: usize,
    /// Capacity of the receive loop to dispatcher channel.
    pub handoff_capacity: usize,
    /// Delay before retrying a failed pull.
    pub pull_retry: Duration,
    pub width: u32,
    pub height: u32,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_messages: config.queue.max_messages,
            handoff_capacity: config.queue.handoff_capacity,
            pull_retry: Duration::from_millis(config.worker.pull_retry_ms),
            width: config.generation.width,
            height: config.generation.height,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            max_messages: 10,
            handoff_capacity: 16,
            pull_retry: Duration::from_secs(1),
            width: 512,
            height: 512,
        }
    }
}

/// Snapshot of worker activity.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WorkerStatus {
    pub running: bool,
    pub jobs_received: u64,
    pub jobs_nacked: u64,
    pub jobs_dropped: u64,
    pub jobs_generated: u64,
    pub jobs_failed: u64,
    pub current_job: Option<CorrelationId>,
    pub deliveries_in_flight: u64,
    pub deliveries_completed: u64,
    pub deliveries_failed: u64,
}

#[derive(Debug, Default)]
pub(crate) struct WorkerStats {
    pub received: AtomicU64,
    pub nacked: AtomicU64,
    pub dropped: AtomicU64,
    pub generated: AtomicU64,
    pub failed: AtomicU64,
    pub deliveries_in_flight: AtomicU64,
    pub deliveries_completed: AtomicU64,
    pub deliveries_failed: AtomicU64,
    pub current_job: RwLock<Option<CorrelationId>>,
}

impl WorkerStats {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn to_status(&self, running: bool) -> WorkerStatus {
        WorkerStatus {
            running,
            jobs_received: self.received.load(Ordering::Relaxed),
            jobs_nacked: self.nacked.load(Ordering::Relaxed),
            jobs_dropped: self.dropped.load(Ordering::Relaxed),
            jobs_generated: self.generated.load(Ordering::Relaxed),
            jobs_failed: self.failed.load(Ordering::Relaxed),
            current_job: *self.current_job.read().await,
            deliveries_in_flight: self.deliveries_in_flight.load(Ordering::Relaxed),
            deliveries_completed: self.deliveries_completed.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
        }
    }
}
