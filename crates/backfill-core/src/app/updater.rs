//! Status updater / completion detector.
//!
//! Folds one fetched page into the subscription and says what should happen
//! next. Pure state mutation: saving, enqueueing and notifying are the
//! orchestrator's job.

use crate::domain::{
    RepositoryId, ResultPage, StepOutcome, Subscription, SyncStatus, TaskKind, TaskStatus,
    select_next,
};

/// Apply `page` (the result of fetching `task` for `repository`).
///
/// - non-empty page: the task stays pending and its cursor moves to the last
///   item, `Continue(cursor)`;
/// - empty page: the task is complete; `InstallationComplete` (and
///   `sync_status = COMPLETE`) when nothing else is pending, `TaskComplete`
///   otherwise.
///
/// Applying an empty page to an already complete task is harmless and gives
/// the same answer again.
pub fn apply_result(
    subscription: &mut Subscription,
    repository: RepositoryId,
    task: TaskKind,
    page: &ResultPage,
) -> StepOutcome {
    let installation_id = subscription.installation_id();

    match subscription.repo_sync_state.get_mut(repository) {
        Some(status) => {
            if let Some(cursor) = page.last_cursor() {
                let progress = status.task_mut(task);
                progress.status = TaskStatus::Pending;
                progress.cursor = Some(cursor.clone());
                if subscription.sync_status == SyncStatus::Complete {
                    subscription.sync_status = SyncStatus::Active;
                }
                return StepOutcome::Continue(cursor.clone());
            }
            status.task_mut(task).status = TaskStatus::Complete;
            tracing::info!(%installation_id, repository_id = %repository, %task, "task complete");
        }
        None => {
            // repository vanished from the state between selection and now
            tracing::warn!(
                %installation_id,
                repository_id = %repository,
                %task,
                items = page.len(),
                "page for unknown repository dropped"
            );
        }
    }

    match select_next(subscription) {
        None => {
            subscription.sync_status = SyncStatus::Complete;
            StepOutcome::InstallationComplete
        }
        Some(_) => {
            let pending = subscription.repo_sync_state.pending_repository_ids();
            tracing::info!(
                %installation_id,
                pending_repositories = ?pending,
                "installation still has pending repositories"
            );
            StepOutcome::TaskComplete
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Cursor, DestinationHost, Installation, InstallationId, PageItem, Repository,
    };
    use serde_json::json;

    fn subscription(repo_ids: &[u64]) -> Subscription {
        let mut sub = Subscription::new(Installation::new(
            InstallationId::new(1),
            DestinationHost::new("h"),
        ));
        for &id in repo_ids {
            sub.repo_sync_state
                .insert_if_absent(Repository::new(RepositoryId::new(id), "acme", format!("r{id}")));
        }
        sub.sync_status = SyncStatus::Active;
        sub
    }

    fn complete(sub: &mut Subscription, repo: u64, kinds: &[TaskKind]) {
        let status = sub.repo_sync_state.get_mut(RepositoryId::new(repo)).unwrap();
        for &kind in kinds {
            status.task_mut(kind).status = TaskStatus::Complete;
        }
    }

    fn page(cursors: &[&str]) -> ResultPage {
        cursors
            .iter()
            .map(|c| PageItem::new(json!({ "id": c }), *c))
            .collect()
    }

    #[test]
    fn non_empty_page_moves_cursor_to_last_item() {
        let mut sub = subscription(&[1]);

        let outcome = apply_result(&mut sub, RepositoryId::new(1), TaskKind::PullRequest, &page(&["a", "b"]));

        assert_eq!(outcome, StepOutcome::Continue(Cursor::new("b")));
        let progress = sub.repo_sync_state.get(RepositoryId::new(1)).unwrap().task(TaskKind::PullRequest);
        assert_eq!(progress.status, TaskStatus::Pending);
        assert_eq!(progress.cursor, Some(Cursor::new("b")));
        assert_eq!(sub.sync_status, SyncStatus::Active);
        assert!(sub.is_consistent());
    }

    #[test]
    fn empty_page_with_other_work_pending_is_task_complete() {
        let mut sub = subscription(&[1, 2]);

        let outcome = apply_result(&mut sub, RepositoryId::new(1), TaskKind::PullRequest, &ResultPage::empty());

        assert_eq!(outcome, StepOutcome::TaskComplete);
        assert!(sub.repo_sync_state.get(RepositoryId::new(1)).unwrap().task(TaskKind::PullRequest).is_complete());
        assert_eq!(sub.sync_status, SyncStatus::Active);
        assert!(sub.is_consistent());
    }

    #[test]
    fn last_empty_page_completes_the_installation() {
        let mut sub = subscription(&[1]);
        complete(&mut sub, 1, &[TaskKind::Branch, TaskKind::Commit]);

        let outcome = apply_result(&mut sub, RepositoryId::new(1), TaskKind::PullRequest, &ResultPage::empty());

        assert_eq!(outcome, StepOutcome::InstallationComplete);
        assert_eq!(sub.sync_status, SyncStatus::Complete);
        assert!(sub.is_consistent());
    }

    #[test]
    fn empty_page_applied_twice_gives_the_same_answer() {
        let mut sub = subscription(&[1]);
        complete(&mut sub, 1, &[TaskKind::Branch, TaskKind::Commit]);

        let first = apply_result(&mut sub, RepositoryId::new(1), TaskKind::PullRequest, &ResultPage::empty());
        let after_first = sub.clone();
        let second = apply_result(&mut sub, RepositoryId::new(1), TaskKind::PullRequest, &ResultPage::empty());

        assert_eq!(first, StepOutcome::InstallationComplete);
        assert_eq!(second, StepOutcome::InstallationComplete);
        assert_eq!(sub, after_first);
    }

    #[test]
    fn consistency_holds_after_every_step_of_a_walk() {
        let mut sub = subscription(&[1, 2]);
        let mut steps = 0;

        while let Some(next) = select_next(&sub) {
            // two pages per task: one with data, then the empty terminator
            let progress = sub
                .repo_sync_state
                .get(next.repository.id)
                .unwrap()
                .task(next.task);
            let next_page = match progress.cursor {
                None => page(&["x"]),
                Some(_) => ResultPage::empty(),
            };
            apply_result(&mut sub, next.repository.id, next.task, &next_page);
            assert!(sub.is_consistent());
            steps += 1;
        }

        assert_eq!(steps, 2 * 2 * TaskKind::ALL.len());
        assert_eq!(sub.sync_status, SyncStatus::Complete);
    }

    #[test]
    fn unknown_repository_changes_nothing_but_still_reports() {
        let mut sub = subscription(&[1]);
        let before = sub.clone();

        let outcome = apply_result(&mut sub, RepositoryId::new(9), TaskKind::Commit, &page(&["z"]));

        assert_eq!(outcome, StepOutcome::TaskComplete);
        assert_eq!(sub, before);
    }
}
