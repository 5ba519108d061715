//! JobQueue port - one logical queue per `TaskKind`.
//!
//! Design intent (same split as any lease based queue):
//! - the queue owns job records and their state transitions
//!   (Queued -> Running -> Completed / RetryScheduled / Dead);
//! - a worker leases a job, runs it, and reports back through the lease;
//! - on failure the queue decides retry vs dead-letter, the worker doesn't.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Failure, QueueError, SyncJob, TaskKind};

/// A leased job. The holder must either `ack` or `fail` it.
#[async_trait]
pub trait JobLease: Send {
    fn job(&self) -> &SyncJob;

    /// 1 for the first run of this job, 2 for the first retry, ...
    fn attempt(&self) -> u32;

    async fn ack(self: Box<Self>) -> Result<(), QueueError>;

    async fn fail(self: Box<Self>, failure: Failure) -> Result<(), QueueError>;
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Add `job` to the `task` queue. Its delivery options travel with it.
    async fn enqueue(&self, task: TaskKind, job: SyncJob) -> Result<(), QueueError>;

    /// Wait for the next ready job on the `task` queue.
    /// `None` once the queue has been closed.
    async fn lease(&self, task: TaskKind) -> Option<Box<dyn JobLease>>;

    async fn counts(&self) -> QueueCounts;

    /// Stop handing out leases; waiting `lease` calls return `None`.
    async fn close(&self);
}

/// Number of retained job records per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub retry_scheduled: usize,
    pub dead: usize,
    /// Jobs dead-lettered since the queue was created, including those whose
    /// record was dropped by `remove_on_fail`. Never decreases.
    #[serde(default)]
    pub dead_lettered: u64,
}

impl QueueCounts {
    /// Jobs that will still run (or are running).
    pub fn outstanding(&self) -> usize {
        self.queued + self.running + self.retry_scheduled
    }
}
