//! In-memory source system: a fixed list of items per repository, paged by
//! position. Backs the CLI demo and the orchestration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{Cursor, FetchError, PageItem, Repository, RepositoryId, ResultPage};
use crate::ports::{FetchContext, PageFetcher};

/// One fetch as seen by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub repository: RepositoryId,
    pub cursor: Option<Cursor>,
    pub page_size: u32,
}

#[derive(Debug, Default)]
struct SourceState {
    items: HashMap<RepositoryId, Vec<serde_json::Value>>,
    failures: VecDeque<FetchError>,
    calls: Vec<FetchCall>,
}

/// Cursors are the decimal position of an item; unknown repositories have no
/// items. Scripted failures are returned (oldest first) before any real page.
#[derive(Debug, Default)]
pub struct InMemorySource {
    state: Mutex<SourceState>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(
        self,
        repository: RepositoryId,
        items: impl IntoIterator<Item = serde_json::Value>,
    ) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.items.insert(repository, items.into_iter().collect());
        }
        self
    }

    /// Fail the next fetch (any repository) with `err`.
    pub fn fail_next(&self, err: FetchError) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.push_back(err);
        }
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.state
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PageFetcher for InMemorySource {
    async fn fetch_page(
        &self,
        _ctx: &FetchContext,
        repository: &Repository,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<ResultPage, FetchError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| FetchError::transient("in-memory source lock poisoned"))?;
        state.calls.push(FetchCall {
            repository: repository.id,
            cursor: cursor.cloned(),
            page_size,
        });
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }

        let start = match cursor {
            None => 0,
            Some(cursor) => {
                let position: usize = cursor.as_str().parse().map_err(|_| {
                    FetchError::permanent(format!("malformed cursor '{cursor}'"))
                })?;
                position + 1
            }
        };
        let items = state
            .items
            .get(&repository.id)
            .map(Vec::as_slice)
            .unwrap_or_default();

        Ok(items
            .iter()
            .enumerate()
            .skip(start)
            .take(page_size as usize)
            .map(|(position, item)| PageItem::new(item.clone(), Cursor::new(position.to_string())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DestinationHost, Installation, InstallationId, JobId};
    use serde_json::json;
    use ulid::Ulid;

    fn ctx() -> FetchContext {
        FetchContext {
            installation: Installation::new(InstallationId::new(1), DestinationHost::new("h")),
            job_id: JobId::from(Ulid::new()),
        }
    }

    #[tokio::test]
    async fn pages_through_items_by_position() {
        let repo = Repository::new(RepositoryId::new(1), "acme", "api");
        let source = InMemorySource::new()
            .with_items(repo.id, (0..5).map(|n| json!({ "n": n })));

        let first = source.fetch_page(&ctx(), &repo, None, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first.last_cursor(), Some(&Cursor::new("1")));

        let last = source
            .fetch_page(&ctx(), &repo, Some(&Cursor::new("3")), 2)
            .await
            .unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last.items()[0].item, json!({ "n": 4 }));

        let done = source
            .fetch_page(&ctx(), &repo, Some(&Cursor::new("4")), 2)
            .await
            .unwrap();
        assert!(done.is_empty());
        assert_eq!(source.calls().len(), 3);
    }

    #[tokio::test]
    async fn scripted_failure_comes_first() {
        let repo = Repository::new(RepositoryId::new(1), "acme", "api");
        let source = InMemorySource::new().with_items(repo.id, [json!(1)]);
        source.fail_next(FetchError::transient("boom"));

        assert!(source.fetch_page(&ctx(), &repo, None, 10).await.is_err());
        assert_eq!(source.fetch_page(&ctx(), &repo, None, 10).await.unwrap().len(), 1);
    }
}
