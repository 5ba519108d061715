//! Status - 進捗とキューの状態を説明するビュー
//!
//! Read-only; nothing here mutates a subscription.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{
    DestinationHost, InstallationId, RepositoryId, StoreError, Subscription, SyncStatus, TaskKind,
    select_next,
};
use crate::ports::{JobQueue, QueueCounts, SubscriptionStore};

/// Where a subscription stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationProgress {
    pub installation_id: InstallationId,
    pub destination_host: DestinationHost,
    pub sync_status: SyncStatus,
    pub repositories: usize,
    pub repositories_complete: usize,
    pub tasks_complete: usize,
    pub tasks_total: usize,
    /// What the next job would work on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<NextStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextStep {
    pub repository: RepositoryId,
    pub task: TaskKind,
    pub resumes_from_cursor: bool,
}

impl InstallationProgress {
    pub fn of(subscription: &Subscription) -> Self {
        let state = &subscription.repo_sync_state;
        let tasks_complete = state
            .iter()
            .flat_map(|repo| TaskKind::ALL.map(|kind| repo.task(kind).is_complete()))
            .filter(|complete| *complete)
            .count();
        let next = select_next(subscription).map(|next| NextStep {
            resumes_from_cursor: state
                .get(next.repository.id)
                .is_some_and(|repo| repo.task(next.task).cursor.is_some()),
            repository: next.repository.id,
            task: next.task,
        });

        Self {
            installation_id: subscription.installation_id(),
            destination_host: subscription.destination_host().clone(),
            sync_status: subscription.sync_status,
            repositories: state.len(),
            repositories_complete: state.iter().filter(|repo| repo.is_complete()).count(),
            tasks_complete,
            tasks_total: state.len() * TaskKind::ALL.len(),
            next,
            updated_at: subscription.updated_at,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.sync_status == SyncStatus::Complete
    }
}

/// Installation progress plus the queue it is being fed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installation: Option<InstallationProgress>,
    pub queue: QueueCounts,
}

/// `installation: None` when the installation has no subscription.
pub async fn status_report(
    store: &dyn SubscriptionStore,
    queue: &dyn JobQueue,
    destination_host: &DestinationHost,
    installation_id: InstallationId,
) -> Result<StatusReport, StoreError> {
    let installation = store
        .load(destination_host, installation_id)
        .await?
        .as_ref()
        .map(InstallationProgress::of);
    Ok(StatusReport {
        installation,
        queue: queue.counts().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cursor, Installation, Repository, TaskStatus};
    use crate::impls::{InMemoryJobQueue, InMemorySubscriptionStore};

    fn subscription() -> Subscription {
        let mut sub = Subscription::new(Installation::new(
            InstallationId::new(5),
            DestinationHost::new("h"),
        ));
        for id in [1, 2] {
            sub.repo_sync_state
                .insert_if_absent(Repository::new(RepositoryId::new(id), "acme", format!("r{id}")));
        }
        let first = sub.repo_sync_state.get_mut(RepositoryId::new(1)).unwrap();
        for kind in TaskKind::ALL {
            first.task_mut(kind).status = TaskStatus::Complete;
        }
        let second = sub.repo_sync_state.get_mut(RepositoryId::new(2)).unwrap();
        second.task_mut(TaskKind::PullRequest).cursor = Some(Cursor::new("c"));
        sub.sync_status = SyncStatus::Active;
        sub
    }

    #[test]
    fn progress_counts_tasks_and_names_the_next_step() {
        let progress = InstallationProgress::of(&subscription());

        assert_eq!(progress.repositories, 2);
        assert_eq!(progress.repositories_complete, 1);
        assert_eq!(progress.tasks_complete, 3);
        assert_eq!(progress.tasks_total, 6);
        assert_eq!(
            progress.next,
            Some(NextStep {
                repository: RepositoryId::new(2),
                task: TaskKind::PullRequest,
                resumes_from_cursor: true,
            })
        );
        assert!(!progress.is_complete());
    }

    #[tokio::test]
    async fn report_for_unknown_installation_has_only_queue_counts() {
        let store = InMemorySubscriptionStore::new();
        let queue = InMemoryJobQueue::default();

        let report = status_report(&store, &queue, &DestinationHost::new("h"), InstallationId::new(1))
            .await
            .unwrap();

        assert!(report.installation.is_none());
        assert_eq!(report.queue, QueueCounts::default());
        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("installation").is_none());
    }

    #[tokio::test]
    async fn report_reads_the_stored_subscription() {
        let store = InMemorySubscriptionStore::new();
        store.save(&subscription()).await.unwrap();
        let queue = InMemoryJobQueue::default();

        let report = status_report(&store, &queue, &DestinationHost::new("h"), InstallationId::new(5))
            .await
            .unwrap();

        assert_eq!(report.installation.unwrap().sync_status, SyncStatus::Active);
    }
}
