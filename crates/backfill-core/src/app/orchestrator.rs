//! SyncOrchestrator - 1 ジョブ = 1 ページ進める
//!
//! load -> select -> mark ACTIVE -> fetch -> apply -> save -> continue/notify.
//!
//! The inbound job's repository/task are never trusted: the pair to advance
//! is always re-derived from the freshly loaded subscription. Callers must not
//! run two jobs of the same installation at once (see `InstallationLimiter`).

use std::sync::Arc;

use crate::app::{StepExecutor, TaskCatalog, updater};
use crate::domain::{
    DeliveryOptions, Installation, JobId, Repository, StepOutcome, StepReport, Subscription,
    SyncError, SyncJob, SyncStatus, select_next,
};
use crate::ports::{
    Clock, Destination, FetchContext, IdGenerator, JobQueue, SubscriptionStore, SystemClock,
    UlidGenerator,
};

pub struct SyncOrchestrator {
    store: Arc<dyn SubscriptionStore>,
    executor: StepExecutor,
    queue: Arc<dyn JobQueue>,
    destination: Arc<dyn Destination>,
    id_generator: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        catalog: TaskCatalog,
        queue: Arc<dyn JobQueue>,
        destination: Arc<dyn Destination>,
    ) -> Self {
        Self {
            store,
            executor: StepExecutor::new(catalog, StepExecutor::DEFAULT_PAGE_SIZE),
            queue,
            destination,
            id_generator: Arc::new(UlidGenerator::new(SystemClock)),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.executor = StepExecutor::new(self.executor.catalog().clone(), page_size);
        self
    }

    /// Use `clock` for `updated_at` and for the timestamp part of job ids.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.id_generator = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        self.clock = clock;
        self
    }

    pub fn page_size(&self) -> u32 {
        self.executor.page_size()
    }

    /// Handle one job: advance the installation by exactly one page.
    ///
    /// Fetch failures come back as `Err` after the subscription was marked
    /// ACTIVE but before any progress was recorded, so a retry resumes from
    /// the same cursor.
    #[tracing::instrument(
        name = "sync_job",
        skip_all,
        fields(job_id = %job.job_id, installation_id = %job.installation_id)
    )]
    pub async fn handle(&self, job: &SyncJob) -> Result<StepReport, SyncError> {
        let Some(mut subscription) = self
            .store
            .load(&job.destination_host, job.installation_id)
            .await?
        else {
            tracing::info!("no subscription for installation, skipping");
            return Ok(StepReport::SubscriptionMissing);
        };

        let Some(next) = select_next(&subscription) else {
            // 遅れて来た / 重複したトリガー
            tracing::debug!(sync_status = ?subscription.sync_status, "nothing pending, skipping");
            return Ok(StepReport::NothingToDo);
        };
        if job.task != Some(next.task) || job.repository.id != next.repository.id {
            tracing::debug!(
                hinted_repository = %job.repository.id,
                hinted_task = ?job.task,
                "job hint is stale, using current state"
            );
        }

        subscription.sync_status = SyncStatus::Active;
        subscription.touch(self.clock.now());
        self.store.save(&subscription).await?;

        let cursor = subscription
            .repo_sync_state
            .get(next.repository.id)
            .and_then(|status| status.task(next.task).cursor.clone());
        let ctx = FetchContext {
            installation: subscription.installation.clone(),
            job_id: job.job_id,
        };
        let page = self
            .executor
            .execute_step(&ctx, &next.repository, next.task, cursor.as_ref())
            .await?;

        let outcome = updater::apply_result(&mut subscription, next.repository.id, next.task, &page);
        subscription.touch(self.clock.now());
        self.store.save(&subscription).await?;

        let mut continuation = None;
        match &outcome {
            StepOutcome::Continue(cursor) => {
                let job_id = self.id_generator.generate_job_id();
                let next_job = job.continuation(job_id, next.repository.clone(), next.task);
                self.queue.enqueue(next.task, next_job).await?;
                tracing::debug!(%cursor, continuation = %job_id, "continuation enqueued");
                continuation = Some(job_id);
            }
            StepOutcome::TaskComplete => {}
            StepOutcome::InstallationComplete => {
                tracing::info!("installation sync complete");
                self.notify_complete(&subscription.installation).await;
            }
        }

        tracing::info!(
            repository_id = %next.repository.id,
            repository = %next.repository.full_name(),
            task = %next.task,
            items = page.len(),
            outcome = ?outcome,
            "page applied"
        );
        Ok(StepReport::Advanced {
            repository: next.repository.id,
            task: next.task,
            items: page.len(),
            outcome,
            continuation,
        })
    }

    /// Kick off (or resume) a sync.
    ///
    /// Creates the subscription if needed, appends newly discovered
    /// repositories in the given order without touching existing progress,
    /// saves, and enqueues one job for the first pending (repository, task).
    /// Returns `None` when nothing is pending; the subscription is then
    /// COMPLETE.
    #[tracing::instrument(
        name = "start_sync",
        skip_all,
        fields(installation_id = %installation.installation_id)
    )]
    pub async fn start_sync(
        &self,
        installation: &Installation,
        repositories: impl IntoIterator<Item = Repository> + Send,
        delivery: DeliveryOptions,
    ) -> Result<Option<JobId>, SyncError> {
        let mut subscription = self
            .store
            .load(&installation.destination_host, installation.installation_id)
            .await?
            .unwrap_or_else(|| Subscription::new(installation.clone()));

        let added = repositories
            .into_iter()
            .filter(|repository| subscription.repo_sync_state.insert_if_absent(repository.clone()))
            .count();
        if added > 0 {
            tracing::info!(added, total = subscription.repo_sync_state.len(), "repositories discovered");
        }

        let Some(next) = select_next(&subscription) else {
            let newly_complete = subscription.sync_status != SyncStatus::Complete;
            subscription.sync_status = SyncStatus::Complete;
            subscription.touch(self.clock.now());
            self.store.save(&subscription).await?;
            if newly_complete {
                self.notify_complete(&subscription.installation).await;
            }
            return Ok(None);
        };

        if subscription.sync_status == SyncStatus::Complete {
            // 完了後に新しい repository が増えた
            subscription.sync_status = SyncStatus::Active;
        }
        subscription.touch(self.clock.now());
        self.store.save(&subscription).await?;

        let job_id = self.id_generator.generate_job_id();
        let job = SyncJob::new(
            job_id,
            &subscription.installation,
            next.repository,
            next.task,
            delivery,
        );
        self.queue.enqueue(next.task, job).await?;
        tracing::info!(job_id = %job_id, task = %next.task, "sync kicked off");
        Ok(Some(job_id))
    }

    /// Failure is logged and otherwise ignored: it must not undo COMPLETE and
    /// the job is not retried for it.
    async fn notify_complete(&self, installation: &Installation) {
        if let Err(err) = self.destination.migration_complete(installation).await {
            tracing::warn!(
                installation_id = %installation.installation_id,
                destination_host = %installation.destination_host,
                error = %err,
                "failed to notify destination of completion"
            );
        }
    }
}
