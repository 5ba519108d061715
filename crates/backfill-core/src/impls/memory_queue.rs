//! In-memory job queue.
//!
//! Single process only: good for the CLI demo and tests, not for surviving a
//! restart. A broker-backed queue implements the same `JobQueue` port.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::domain::{
    Decider, Decision, DefaultDecider, Failure, FailureHistory, JobId, QueueError, SyncJob,
    TaskKind,
};
use crate::ports::{Clock, JobLease, JobQueue, QueueCounts, SystemClock};

/// Job state inside the queue.
///
/// - Queued -> Running -> Completed
/// - Queued -> Running -> RetryScheduled -> Queued (until the decider gives up)
/// - Queued -> Running -> Dead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Queued,
    Running,
    Completed,
    RetryScheduled,
    Dead,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Dead)
    }
}

#[derive(Debug, Clone)]
struct JobRecord {
    job: SyncJob,
    task: TaskKind,
    state: JobState,
    /// Number of leases handed out, including the current one.
    attempts: u32,
    history: FailureHistory,
    last_error: Option<String>,
    next_run_at: Option<Instant>,
    updated_at: Instant,
}

impl JobRecord {
    fn new(task: TaskKind, job: SyncJob) -> Self {
        Self {
            job,
            task,
            state: JobState::Queued,
            attempts: 0,
            history: FailureHistory::default(),
            last_error: None,
            next_run_at: None,
            updated_at: Instant::now(),
        }
    }

    fn start_attempt(&mut self) {
        self.state = JobState::Running;
        self.attempts += 1;
        self.updated_at = Instant::now();
    }

    fn mark_completed(&mut self) {
        self.state = JobState::Completed;
        self.updated_at = Instant::now();
    }

    fn mark_dead(&mut self, error: String) {
        self.state = JobState::Dead;
        self.last_error = Some(error);
        self.updated_at = Instant::now();
    }

    fn schedule_retry(&mut self, next_run_at: Instant, error: String) {
        self.state = JobState::RetryScheduled;
        self.next_run_at = Some(next_run_at);
        self.last_error = Some(error);
        self.updated_at = Instant::now();
    }

    fn requeue(&mut self) {
        self.state = JobState::Queued;
        self.next_run_at = None;
        self.updated_at = Instant::now();
    }
}

/// Read-only view of a retained job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub job: SyncJob,
    pub task: TaskKind,
    pub state: JobState,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl From<&JobRecord> for JobSnapshot {
    fn from(record: &JobRecord) -> Self {
        Self {
            job: record.job.clone(),
            task: record.task,
            state: record.state,
            attempts: record.attempts,
            last_error: record.last_error.clone(),
        }
    }
}

/// Min-heap entry (earliest `next_run_at` first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledJob {
    next_run_at: Instant,
    job_id: JobId,
}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledJob {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.next_run_at.cmp(&self.next_run_at)
    }
}

#[derive(Default)]
struct QueueState {
    /// Single source of truth for retained jobs. The other structures only
    /// hold ids.
    records: HashMap<JobId, JobRecord>,
    ready: HashMap<TaskKind, VecDeque<JobId>>,
    scheduled: BinaryHeap<ScheduledJob>,
    /// Survives record removal and `clean`.
    dead_lettered: u64,
    closed: bool,
}

impl QueueState {
    fn promote_scheduled(&mut self) {
        let now = Instant::now();
        while let Some(entry) = self.scheduled.peek() {
            if entry.next_run_at > now {
                break;
            }
            let Some(entry) = self.scheduled.pop() else {
                break;
            };
            if let Some(record) = self.records.get_mut(&entry.job_id)
                && record.state == JobState::RetryScheduled
            {
                record.requeue();
                self.ready
                    .entry(record.task)
                    .or_default()
                    .push_back(entry.job_id);
            }
        }
    }

    fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts {
            dead_lettered: self.dead_lettered,
            ..QueueCounts::default()
        };
        for record in self.records.values() {
            match record.state {
                JobState::Queued => counts.queued += 1,
                JobState::Running => counts.running += 1,
                JobState::Completed => counts.completed += 1,
                JobState::RetryScheduled => counts.retry_scheduled += 1,
                JobState::Dead => counts.dead += 1,
            }
        }
        counts
    }
}

pub struct InMemoryJobQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
    decider: Arc<dyn Decider>,
    clock: Arc<dyn Clock>,
}

impl InMemoryJobQueue {
    pub fn new(decider: Arc<dyn Decider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            notify: Arc::new(Notify::new()),
            decider,
            clock,
        }
    }

    /// Every retained job, any state.
    pub async fn snapshot(&self) -> Vec<JobSnapshot> {
        let state = self.state.lock().await;
        state.records.values().map(JobSnapshot::from).collect()
    }

    pub async fn job(&self, job_id: JobId) -> Option<JobSnapshot> {
        let state = self.state.lock().await;
        state.records.get(&job_id).map(JobSnapshot::from)
    }

    /// Jobs waiting on the `task` queue, in delivery order.
    pub async fn queued(&self, task: TaskKind) -> Vec<SyncJob> {
        let state = self.state.lock().await;
        state
            .ready
            .get(&task)
            .into_iter()
            .flatten()
            .filter_map(|id| state.records.get(id))
            .map(|record| record.job.clone())
            .collect()
    }

    /// Drop completed and dead records last touched more than `grace` ago.
    /// Returns how many were removed.
    pub async fn clean(&self, grace: Duration) -> usize {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let before = state.records.len();
        state.records.retain(|_, record| {
            !(record.state.is_terminal() && now.duration_since(record.updated_at) >= grace)
        });
        before - state.records.len()
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new(Arc::new(DefaultDecider::default()), Arc::new(SystemClock))
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, task: TaskKind, job: SyncJob) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(QueueError::Closed);
            }
            let job_id = job.job_id;
            tracing::debug!(%job_id, queue = task.queue_name(), installation_id = %job.installation_id, "job enqueued");
            state.records.insert(job_id, JobRecord::new(task, job));
            state.ready.entry(task).or_default().push_back(job_id);
        }
        // waiters may be parked on another kind, wake all of them
        self.notify.notify_waiters();
        Ok(())
    }

    async fn lease(&self, task: TaskKind) -> Option<Box<dyn JobLease>> {
        loop {
            // Register interest before looking at the state so an enqueue
            // between the check and the await is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_wake = {
                let mut state = self.state.lock().await;
                if state.closed {
                    return None;
                }
                state.promote_scheduled();

                while let Some(job_id) = state.ready.get_mut(&task).and_then(VecDeque::pop_front) {
                    // record may be gone if it was cleaned while queued
                    let Some(record) = state.records.get_mut(&job_id) else {
                        continue;
                    };
                    record.start_attempt();
                    return Some(Box::new(InMemoryLease {
                        job_id,
                        job: record.job.clone(),
                        attempt: record.attempts,
                        state: Arc::clone(&self.state),
                        notify: Arc::clone(&self.notify),
                        decider: Arc::clone(&self.decider),
                        clock: Arc::clone(&self.clock),
                    }));
                }

                state.scheduled.peek().map(|entry| entry.next_run_at)
            };

            match next_wake {
                Some(wake_at) => {
                    tokio::select! {
                        _ = &mut notified => {},
                        _ = tokio::time::sleep_until(wake_at) => {},
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn counts(&self) -> QueueCounts {
        self.state.lock().await.counts()
    }

    async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }
}

struct InMemoryLease {
    job_id: JobId,
    job: SyncJob,
    attempt: u32,
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
    decider: Arc<dyn Decider>,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl JobLease for InMemoryLease {
    fn job(&self) -> &SyncJob {
        &self.job
    }

    fn attempt(&self) -> u32 {
        self.attempt
    }

    async fn ack(self: Box<Self>) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let Some(record) = state.records.get_mut(&self.job_id) else {
            return Err(QueueError::UnknownJob(self.job_id.to_string()));
        };
        if record.job.delivery.remove_on_complete {
            state.records.remove(&self.job_id);
        } else {
            record.mark_completed();
        }
        Ok(())
    }

    async fn fail(self: Box<Self>, failure: Failure) -> Result<(), QueueError> {
        let now = self.clock.now();
        let should_notify = {
            let mut state = self.state.lock().await;
            let Some(record) = state.records.get_mut(&self.job_id) else {
                return Err(QueueError::UnknownJob(self.job_id.to_string()));
            };

            record.history = record.history.record(&failure);
            match self.decider.decide(record.history, &failure, now) {
                Decision::Retry { delay, reason } => {
                    let next_run_at = Instant::now() + delay;
                    tracing::warn!(
                        job_id = %self.job_id,
                        queue = record.task.queue_name(),
                        error = %failure.message,
                        ?delay,
                        %reason,
                        "job failed, retry scheduled"
                    );
                    record.schedule_retry(next_run_at, failure.message);
                    state.scheduled.push(ScheduledJob {
                        next_run_at,
                        job_id: self.job_id,
                    });
                    true
                }
                Decision::MarkDead { reason } => {
                    tracing::error!(
                        job_id = %self.job_id,
                        queue = record.task.queue_name(),
                        error = %failure.message,
                        %reason,
                        "job dead-lettered"
                    );
                    if record.job.delivery.remove_on_fail {
                        state.records.remove(&self.job_id);
                    } else {
                        record.mark_dead(failure.message);
                    }
                    state.dead_lettered += 1;
                    false
                }
            }
        };

        // outside the lock
        if should_notify {
            self.notify.notify_waiters();
        }
        Ok(())
    }
}
