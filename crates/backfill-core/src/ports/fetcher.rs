//! PageFetcher port - "fetch one page of X for a repository".
//!
//! One implementation per `TaskKind`. Implementations own their source and
//! destination clients (token acquisition lives there too) and typically push
//! the fetched items to the destination before returning the page.

use async_trait::async_trait;

use crate::domain::{Cursor, FetchError, Installation, JobId, Repository, ResultPage};

/// Who the fetch is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchContext {
    pub installation: Installation,
    pub job_id: JobId,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Up to `page_size` items after `cursor` (from the start when `None`),
    /// in source order. An empty page means there is nothing after `cursor`.
    async fn fetch_page(
        &self,
        ctx: &FetchContext,
        repository: &Repository,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<ResultPage, FetchError>;
}
