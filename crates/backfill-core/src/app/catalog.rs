//! TaskCatalog - task kind ごとの PageFetcher の登録と解決
//!
//! 起動時検証（Fail-fast）: 全ての `TaskKind` に fetcher が無いと `build()`
//! が失敗する。実行時に「handler が無い」状態は起こらない。

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::TaskKind;
use crate::ports::PageFetcher;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Fetcher for task kind '{0}' is already registered")]
    AlreadyRegistered(TaskKind),

    #[error("Missing task kinds: {0:?}. Every task kind needs a fetcher.")]
    MissingTaskKinds(Vec<TaskKind>),
}

/// Fixed, ordered set of task kinds with one fetcher each.
///
/// # 使用例
/// ```ignore
/// let catalog = TaskCatalog::builder()
///     .register(TaskKind::PullRequest, pulls)?
///     .register(TaskKind::Branch, branches)?
///     .register(TaskKind::Commit, commits)?
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TaskCatalog {
    pull_request: Arc<dyn PageFetcher>,
    branch: Arc<dyn PageFetcher>,
    commit: Arc<dyn PageFetcher>,
}

impl TaskCatalog {
    pub fn builder() -> TaskCatalogBuilder {
        TaskCatalogBuilder::new()
    }

    /// Every kind served by the same fetcher. Handy when one client can page
    /// through all three.
    pub fn uniform(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            pull_request: Arc::clone(&fetcher),
            branch: Arc::clone(&fetcher),
            commit: fetcher,
        }
    }

    /// Task kinds in catalog order.
    pub fn kinds(&self) -> &'static [TaskKind] {
        &TaskKind::ALL
    }

    pub fn fetcher(&self, kind: TaskKind) -> &Arc<dyn PageFetcher> {
        match kind {
            TaskKind::PullRequest => &self.pull_request,
            TaskKind::Branch => &self.branch,
            TaskKind::Commit => &self.commit,
        }
    }
}

#[derive(Default)]
pub struct TaskCatalogBuilder {
    fetchers: HashMap<TaskKind, Arc<dyn PageFetcher>>,
}

impl TaskCatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        kind: TaskKind,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self, CatalogError> {
        if self.fetchers.contains_key(&kind) {
            return Err(CatalogError::AlreadyRegistered(kind));
        }
        self.fetchers.insert(kind, fetcher);
        Ok(self)
    }

    pub fn build(mut self) -> Result<TaskCatalog, CatalogError> {
        let missing: Vec<TaskKind> = TaskKind::ALL
            .iter()
            .copied()
            .filter(|kind| !self.fetchers.contains_key(kind))
            .collect();
        if !missing.is_empty() {
            return Err(CatalogError::MissingTaskKinds(missing));
        }

        let mut take = |kind: TaskKind| {
            self.fetchers
                .remove(&kind)
                .ok_or_else(|| CatalogError::MissingTaskKinds(vec![kind]))
        };
        Ok(TaskCatalog {
            pull_request: take(TaskKind::PullRequest)?,
            branch: take(TaskKind::Branch)?,
            commit: take(TaskKind::Commit)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemorySource;

    fn fetcher() -> Arc<dyn PageFetcher> {
        Arc::new(InMemorySource::new())
    }

    #[test]
    fn build_success() {
        let catalog = TaskCatalog::builder()
            .register(TaskKind::PullRequest, fetcher())
            .unwrap()
            .register(TaskKind::Branch, fetcher())
            .unwrap()
            .register(TaskKind::Commit, fetcher())
            .unwrap()
            .build();
        assert!(catalog.is_ok());
    }

    #[test]
    fn build_missing_task_kinds() {
        let catalog = TaskCatalog::builder()
            .register(TaskKind::Branch, fetcher())
            .unwrap()
            .build();
        assert!(matches!(
            catalog,
            Err(CatalogError::MissingTaskKinds(missing))
                if missing == vec![TaskKind::PullRequest, TaskKind::Commit]
        ));
    }

    #[test]
    fn double_registration_is_rejected() {
        let result = TaskCatalog::builder()
            .register(TaskKind::Commit, fetcher())
            .unwrap()
            .register(TaskKind::Commit, fetcher());
        assert!(matches!(
            result,
            Err(CatalogError::AlreadyRegistered(TaskKind::Commit))
        ));
    }

    #[test]
    fn fetchers_resolve_per_kind() {
        let pulls = fetcher();
        let other = fetcher();
        let catalog = TaskCatalog::builder()
            .register(TaskKind::PullRequest, Arc::clone(&pulls))
            .unwrap()
            .register(TaskKind::Branch, Arc::clone(&other))
            .unwrap()
            .register(TaskKind::Commit, Arc::clone(&other))
            .unwrap()
            .build()
            .unwrap();

        assert!(Arc::ptr_eq(catalog.fetcher(TaskKind::PullRequest), &pulls));
        assert!(Arc::ptr_eq(catalog.fetcher(TaskKind::Commit), &other));
        assert_eq!(catalog.kinds(), &TaskKind::ALL);
    }
}
