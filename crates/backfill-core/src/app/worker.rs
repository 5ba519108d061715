use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app::{InstallationLimiter, SyncOrchestrator};
use crate::domain::{Failure, TaskKind};
use crate::ports::JobQueue;

/// Worker pool handle.
/// - 各 task kind のキューに `workers_per_kind` 本ずつワーカーを張る
/// - 同じ installation のジョブは `InstallationLimiter` で直列化される
/// - `shutdown_and_join()` で新しい lease を取るのをやめて全員の終了を待つ
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        workers_per_kind: usize,
        queue: Arc<dyn JobQueue>,
        orchestrator: Arc<SyncOrchestrator>,
        limiter: InstallationLimiter,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(workers_per_kind * TaskKind::ALL.len());
        for task in TaskKind::ALL {
            for n in 0..workers_per_kind {
                let worker = Worker {
                    name: format!("{}-{n}", task.queue_name()),
                    task,
                    queue: Arc::clone(&queue),
                    orchestrator: Arc::clone(&orchestrator),
                    limiter: limiter.clone(),
                };
                let rx = shutdown_rx.clone();
                joins.push(tokio::spawn(worker.run(rx)));
            }
        }
        tracing::info!(workers = joins.len(), workers_per_kind, "worker pool started");

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Stop taking new leases. In-flight jobs are not cancelled.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(err) = join.await {
                tracing::error!(error = %err, "worker task panicked");
            }
        }
        tracing::info!("worker pool stopped");
    }
}

struct Worker {
    name: String,
    task: TaskKind,
    queue: Arc<dyn JobQueue>,
    orchestrator: Arc<SyncOrchestrator>,
    limiter: InstallationLimiter,
}

impl Worker {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            // lease は待つので shutdown と競合させる
            let lease = tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        // pool handle dropped without a shutdown request
                        break;
                    }
                    continue;
                }
                lease = self.queue.lease(self.task) => lease,
            };

            // None = queue closed
            let Some(lease) = lease else {
                break;
            };

            let job = lease.job().clone();
            let _permit = self
                .limiter
                .acquire(&job.destination_host, job.installation_id)
                .await;

            match self.orchestrator.handle(&job).await {
                Ok(report) => {
                    tracing::debug!(worker = %self.name, job_id = %job.job_id, ?report, "job done");
                    if let Err(err) = lease.ack().await {
                        tracing::error!(worker = %self.name, job_id = %job.job_id, error = %err, "ack failed");
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        worker = %self.name,
                        job_id = %job.job_id,
                        attempt = lease.attempt(),
                        error = %err,
                        "job failed"
                    );
                    // retry / dead-letter の判断は queue 側
                    if let Err(err) = lease.fail(Failure::from(&err)).await {
                        tracing::error!(worker = %self.name, job_id = %job.job_id, error = %err, "fail report failed");
                    }
                }
            }
        }
        tracing::debug!(worker = %self.name, "worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::TaskCatalog;
    use crate::domain::{
        DeliveryOptions, DestinationHost, FetchError, Installation, InstallationId, RepositoryId,
        Repository, RetryPolicy, DefaultDecider, SyncStatus,
    };
    use crate::impls::{
        InMemoryJobQueue, InMemorySource, InMemorySubscriptionStore, JobState,
        RecordingDestination,
    };
    use crate::ports::{SubscriptionStore, SystemClock};
    use serde_json::json;
    use std::time::Duration;

    fn installation(id: u64) -> Installation {
        Installation::new(InstallationId::new(id), DestinationHost::new("acme.example.net"))
    }

    fn repo(id: u64) -> Repository {
        Repository::new(RepositoryId::new(id), "acme", format!("repo-{id}"))
    }

    #[tokio::test]
    async fn pool_drains_a_started_sync() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let source = Arc::new(
            InMemorySource::new()
                .with_items(RepositoryId::new(1), (0..3).map(|n| json!(n)))
                .with_items(RepositoryId::new(2), [json!("x")]),
        );
        let queue = Arc::new(InMemoryJobQueue::default());
        let destination = Arc::new(RecordingDestination::new());
        let orchestrator = Arc::new(
            SyncOrchestrator::new(
                store.clone(),
                TaskCatalog::uniform(source),
                queue.clone(),
                destination.clone(),
            )
            .with_page_size(2),
        );
        let pool = WorkerPool::spawn(2, queue.clone(), orchestrator.clone(), InstallationLimiter::new());
        assert_eq!(pool.len(), 2 * TaskKind::ALL.len());

        let inst = installation(1);
        let mut kicked = orchestrator
            .start_sync(&inst, [repo(1), repo(2)], DeliveryOptions::new(true, false))
            .await
            .unwrap();
        // chains end on TaskComplete; keep triggering until nothing is pending
        while kicked.is_some() {
            while queue.counts().await.outstanding() > 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            kicked = orchestrator
                .start_sync(&inst, Vec::new(), DeliveryOptions::new(true, false))
                .await
                .unwrap();
        }
        pool.shutdown_and_join().await;

        let sub = store
            .load(&inst.destination_host, inst.installation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.sync_status, SyncStatus::Complete);
        assert!(sub.is_consistent());
        assert_eq!(destination.calls(), 1);
        // remove_on_complete: nothing retained
        assert!(queue.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn failed_job_goes_to_the_dead_letter_state() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let source = Arc::new(InMemorySource::new());
        source.fail_next(FetchError::permanent("repository not found"));
        let decider = Arc::new(DefaultDecider::new(RetryPolicy::default()));
        let queue = Arc::new(InMemoryJobQueue::new(decider, Arc::new(SystemClock)));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store.clone(),
            TaskCatalog::uniform(source),
            queue.clone(),
            Arc::new(RecordingDestination::new()),
        ));
        let pool = WorkerPool::spawn(1, queue.clone(), orchestrator.clone(), InstallationLimiter::new());

        let job_id = orchestrator
            .start_sync(&installation(1), [repo(1)], DeliveryOptions::default())
            .await
            .unwrap()
            .unwrap();
        while queue.counts().await.dead == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        pool.shutdown_and_join().await;

        let snapshot = queue.job(job_id).await.unwrap();
        assert_eq!(snapshot.state, JobState::Dead);
        assert_eq!(snapshot.attempts, 1);
    }

    #[tokio::test]
    async fn shutdown_stops_idle_workers() {
        let queue = Arc::new(InMemoryJobQueue::default());
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::new(InMemorySubscriptionStore::new()),
            TaskCatalog::uniform(Arc::new(InMemorySource::new())),
            queue.clone(),
            Arc::new(RecordingDestination::new()),
        ));
        let pool = WorkerPool::spawn(3, queue, orchestrator, InstallationLimiter::new());

        let joined = tokio::time::timeout(Duration::from_secs(1), pool.shutdown_and_join()).await;
        assert!(joined.is_ok());
    }
}
