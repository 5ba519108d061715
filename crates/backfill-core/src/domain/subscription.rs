//! Subscription: the persisted sync progress of one installation.
//!
//! Layout:
//! - `Subscription` owns the installation identity, the overall `SyncStatus`
//!   and a `RepoSyncState`.
//! - `RepoSyncState` is an insertion-ordered collection of `RepoStatus`, one
//!   per discovered repository. Iteration order is discovery order and is
//!   what the selector walks.
//! - `RepoStatus` carries one `TaskProgress` (status + resume cursor) per
//!   `TaskKind`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{DestinationHost, InstallationId, RepositoryId};
use super::page::Cursor;
use super::task_kind::TaskKind;

/// Tenant identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Installation {
    pub installation_id: InstallationId,
    pub destination_host: DestinationHost,
}

impl Installation {
    pub fn new(installation_id: InstallationId, destination_host: DestinationHost) -> Self {
        Self {
            installation_id,
            destination_host,
        }
    }
}

/// Repository identity plus the metadata fetchers need to address it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub owner: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
}

impl Repository {
    pub fn new(id: RepositoryId, owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            owner: owner.into(),
            name: name.into(),
            html_url: None,
        }
    }

    pub fn with_html_url(mut self, url: impl Into<String>) -> Self {
        self.html_url = Some(url.into());
        self
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Whole-installation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Pending,
    Active,
    Complete,
}

/// Per-repository, per-kind status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Complete,
}

/// Status and resume cursor of one (repository, kind) walk.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskProgress {
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

impl TaskProgress {
    pub fn is_complete(&self) -> bool {
        self.status == TaskStatus::Complete
    }
}

/// Progress record of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStatus {
    pub repository: Repository,
    #[serde(default)]
    pub pull: TaskProgress,
    #[serde(default)]
    pub branch: TaskProgress,
    #[serde(default)]
    pub commit: TaskProgress,
}

impl RepoStatus {
    /// Fresh record: every kind pending, no cursor.
    pub fn new(repository: Repository) -> Self {
        Self {
            repository,
            pull: TaskProgress::default(),
            branch: TaskProgress::default(),
            commit: TaskProgress::default(),
        }
    }

    pub fn task(&self, kind: TaskKind) -> &TaskProgress {
        match kind {
            TaskKind::PullRequest => &self.pull,
            TaskKind::Branch => &self.branch,
            TaskKind::Commit => &self.commit,
        }
    }

    pub fn task_mut(&mut self, kind: TaskKind) -> &mut TaskProgress {
        match kind {
            TaskKind::PullRequest => &mut self.pull,
            TaskKind::Branch => &mut self.branch,
            TaskKind::Commit => &mut self.commit,
        }
    }

    /// First kind (catalog order) that still has pages to fetch.
    pub fn first_pending(&self) -> Option<TaskKind> {
        TaskKind::ALL
            .into_iter()
            .find(|kind| !self.task(*kind).is_complete())
    }

    pub fn is_complete(&self) -> bool {
        self.first_pending().is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("repository {0} appears more than once in the sync state")]
pub struct DuplicateRepository(pub RepositoryId);

/// Insertion-ordered map RepositoryId -> RepoStatus.
///
/// Stored as a list so the order survives serialization. Ids are unique;
/// deserialization rejects duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RepoStatus>", into = "Vec<RepoStatus>")]
pub struct RepoSyncState {
    repos: Vec<RepoStatus>,
}

impl TryFrom<Vec<RepoStatus>> for RepoSyncState {
    type Error = DuplicateRepository;

    fn try_from(repos: Vec<RepoStatus>) -> Result<Self, Self::Error> {
        let mut state = RepoSyncState::default();
        for repo in repos {
            let id = repo.repository.id;
            if state.get(id).is_some() {
                return Err(DuplicateRepository(id));
            }
            state.repos.push(repo);
        }
        Ok(state)
    }
}

impl From<RepoSyncState> for Vec<RepoStatus> {
    fn from(state: RepoSyncState) -> Self {
        state.repos
    }
}

impl RepoSyncState {
    pub fn get(&self, id: RepositoryId) -> Option<&RepoStatus> {
        self.repos.iter().find(|r| r.repository.id == id)
    }

    pub fn get_mut(&mut self, id: RepositoryId) -> Option<&mut RepoStatus> {
        self.repos.iter_mut().find(|r| r.repository.id == id)
    }

    /// Append a repository at the end of the order. Existing entries (and
    /// their progress) are left untouched; returns whether it was added.
    pub fn insert_if_absent(&mut self, repository: Repository) -> bool {
        if self.get(repository.id).is_some() {
            return false;
        }
        self.repos.push(RepoStatus::new(repository));
        true
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &RepoStatus> {
        self.repos.iter()
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    pub fn all_complete(&self) -> bool {
        self.repos.iter().all(RepoStatus::is_complete)
    }

    /// Ids of repositories with at least one pending kind, in order.
    pub fn pending_repository_ids(&self) -> Vec<RepositoryId> {
        self.repos
            .iter()
            .filter(|r| !r.is_complete())
            .map(|r| r.repository.id)
            .collect()
    }
}

/// Persisted sync state of one installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub installation: Installation,
    pub sync_status: SyncStatus,
    #[serde(default)]
    pub repo_sync_state: RepoSyncState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn new(installation: Installation) -> Self {
        Self {
            installation,
            sync_status: SyncStatus::Pending,
            repo_sync_state: RepoSyncState::default(),
            updated_at: None,
        }
    }

    pub fn installation_id(&self) -> InstallationId {
        self.installation.installation_id
    }

    pub fn destination_host(&self) -> &DestinationHost {
        &self.installation.destination_host
    }

    /// `sync_status == COMPLETE` iff every kind of every repository is complete.
    pub fn is_consistent(&self) -> bool {
        (self.sync_status == SyncStatus::Complete) == self.repo_sync_state.all_complete()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(id: u64) -> Repository {
        Repository::new(RepositoryId::new(id), "acme", format!("repo-{id}"))
    }

    #[test]
    fn full_name_joins_owner_and_name() {
        assert_eq!(repo(3).full_name(), "acme/repo-3");
    }

    #[test]
    fn new_repo_status_is_all_pending_without_cursor() {
        let status = RepoStatus::new(repo(1));
        for kind in TaskKind::ALL {
            assert_eq!(status.task(kind).status, TaskStatus::Pending);
            assert_eq!(status.task(kind).cursor, None);
        }
        assert_eq!(status.first_pending(), Some(TaskKind::PullRequest));
    }

    #[test]
    fn insert_if_absent_keeps_order_and_progress() {
        let mut state = RepoSyncState::default();
        assert!(state.insert_if_absent(repo(3)));
        assert!(state.insert_if_absent(repo(1)));

        state.get_mut(RepositoryId::new(3)).unwrap().pull.status = TaskStatus::Complete;
        assert!(!state.insert_if_absent(repo(3)));

        let ids: Vec<_> = state.iter().map(|r| r.repository.id.get()).collect();
        assert_eq!(ids, vec![3, 1]);
        assert!(state.get(RepositoryId::new(3)).unwrap().pull.is_complete());
    }

    #[test]
    fn order_survives_json() {
        let mut state = RepoSyncState::default();
        for id in [9, 2, 5] {
            state.insert_if_absent(repo(id));
        }

        let json = serde_json::to_string(&state).unwrap();
        let back: RepoSyncState = serde_json::from_str(&json).unwrap();

        let ids: Vec<_> = back.iter().map(|r| r.repository.id.get()).collect();
        assert_eq!(ids, vec![9, 2, 5]);
    }

    #[test]
    fn duplicate_repositories_are_rejected_on_load() {
        let json = serde_json::json!([
            { "repository": { "id": 1, "owner": "acme", "name": "a" } },
            { "repository": { "id": 1, "owner": "acme", "name": "a" } },
        ]);

        let err = serde_json::from_value::<RepoSyncState>(json).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn consistency_tracks_completion() {
        let installation = Installation::new(InstallationId::new(1), DestinationHost::new("h"));
        let mut sub = Subscription::new(installation);
        sub.repo_sync_state.insert_if_absent(repo(1));
        assert!(sub.is_consistent());

        let status = sub.repo_sync_state.get_mut(RepositoryId::new(1)).unwrap();
        for kind in TaskKind::ALL {
            status.task_mut(kind).status = TaskStatus::Complete;
        }
        assert!(!sub.is_consistent());

        sub.sync_status = SyncStatus::Complete;
        assert!(sub.is_consistent());
    }
}
