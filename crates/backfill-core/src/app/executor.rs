//! StepExecutor - 1 ページ分の fetch を実行する

use crate::app::TaskCatalog;
use crate::domain::{Cursor, Repository, ResultPage, SyncError, TaskKind};
use crate::ports::FetchContext;

/// Fetches one page of `task` for a repository through the catalog.
/// Holds no state of its own; the page size comes from configuration.
#[derive(Clone)]
pub struct StepExecutor {
    catalog: TaskCatalog,
    page_size: u32,
}

impl StepExecutor {
    pub const DEFAULT_PAGE_SIZE: u32 = 100;

    pub fn new(catalog: TaskCatalog, page_size: u32) -> Self {
        Self { catalog, page_size }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn catalog(&self) -> &TaskCatalog {
        &self.catalog
    }

    /// `cursor == None` starts from the beginning. A fetch failure comes back
    /// as `SyncError::Fetch` with the original error untouched.
    pub async fn execute_step(
        &self,
        ctx: &FetchContext,
        repository: &Repository,
        task: TaskKind,
        cursor: Option<&Cursor>,
    ) -> Result<ResultPage, SyncError> {
        tracing::debug!(
            installation_id = %ctx.installation.installation_id,
            repository_id = %repository.id,
            %task,
            cursor = cursor.map(Cursor::as_str),
            page_size = self.page_size,
            "fetching page"
        );
        self.catalog
            .fetcher(task)
            .fetch_page(ctx, repository, cursor, self.page_size)
            .await
            .map_err(|source| SyncError::Fetch { task, source })
    }
}
