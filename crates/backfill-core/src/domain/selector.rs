//! Next-task selection.
//!
//! Greedy and deterministic: the first repository in discovery order that
//! still has pending work, and within it the first pending kind in catalog
//! order. Each job advances one (repository, kind) pair by one page.

use super::subscription::{Repository, Subscription};
use super::task_kind::TaskKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextTask {
    pub repository: Repository,
    pub task: TaskKind,
}

/// `None` iff every kind of every repository is complete.
pub fn select_next(subscription: &Subscription) -> Option<NextTask> {
    subscription
        .repo_sync_state
        .iter()
        .find_map(|status| {
            status.first_pending().map(|task| NextTask {
                repository: status.repository.clone(),
                task,
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{DestinationHost, InstallationId, RepositoryId};
    use crate::domain::subscription::{Installation, TaskStatus};
    use rstest::rstest;

    fn subscription(repo_ids: &[u64]) -> Subscription {
        let installation = Installation::new(InstallationId::new(1), DestinationHost::new("h"));
        let mut sub = Subscription::new(installation);
        for &id in repo_ids {
            sub.repo_sync_state
                .insert_if_absent(Repository::new(RepositoryId::new(id), "acme", format!("r{id}")));
        }
        sub
    }

    fn complete(sub: &mut Subscription, repo: u64, kinds: &[TaskKind]) {
        let status = sub
            .repo_sync_state
            .get_mut(RepositoryId::new(repo))
            .unwrap();
        for kind in kinds {
            status.task_mut(*kind).status = TaskStatus::Complete;
        }
    }

    #[test]
    fn fresh_repository_starts_with_pull_requests() {
        let sub = subscription(&[1]);
        let next = select_next(&sub).unwrap();
        assert_eq!(next.repository.id, RepositoryId::new(1));
        assert_eq!(next.task, TaskKind::PullRequest);
    }

    #[rstest]
    #[case::pull_done(&[TaskKind::PullRequest], TaskKind::Branch)]
    #[case::branch_done(&[TaskKind::Branch], TaskKind::PullRequest)]
    #[case::pull_and_branch_done(&[TaskKind::PullRequest, TaskKind::Branch], TaskKind::Commit)]
    fn picks_first_pending_kind_in_catalog_order(
        #[case] done: &[TaskKind],
        #[case] expected: TaskKind,
    ) {
        let mut sub = subscription(&[1]);
        complete(&mut sub, 1, done);
        assert_eq!(select_next(&sub).unwrap().task, expected);
    }

    #[test]
    fn skips_completed_repositories() {
        let mut sub = subscription(&[10, 20]);
        complete(&mut sub, 10, &TaskKind::ALL);
        complete(&mut sub, 20, &[TaskKind::PullRequest, TaskKind::Commit]);

        let next = select_next(&sub).unwrap();
        assert_eq!(next.repository.id, RepositoryId::new(20));
        assert_eq!(next.task, TaskKind::Branch);
    }

    #[test]
    fn follows_insertion_order_not_id_order() {
        let sub = subscription(&[30, 5]);
        assert_eq!(select_next(&sub).unwrap().repository.id, RepositoryId::new(30));
    }

    #[test]
    fn none_when_everything_is_complete() {
        let mut sub = subscription(&[1, 2]);
        complete(&mut sub, 1, &TaskKind::ALL);
        complete(&mut sub, 2, &TaskKind::ALL);
        assert_eq!(select_next(&sub), None);
    }

    #[test]
    fn repeated_calls_return_the_same_pair() {
        let mut sub = subscription(&[1, 2, 3]);
        complete(&mut sub, 1, &[TaskKind::PullRequest]);

        let first = select_next(&sub);
        for _ in 0..5 {
            assert_eq!(select_next(&sub), first);
        }
    }
}
