//! Errors and their operational classification.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::task_kind::TaskKind;

/// Operational class of a failure; drives the retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Source said "slow down"; retry once the window resets.
    RateLimited,
    /// Timeouts, 5xx, dropped connections: retry with backoff.
    Transient,
    /// Retrying cannot help (404, revoked access, malformed data).
    Permanent,
    /// Our own storage/queue is unhealthy.
    Infrastructure,
}

/// Failure of a page fetch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("rate limited by source, resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("transient fetch failure: {message}")]
    Transient { message: String },

    #[error("permanent fetch failure: {message}")]
    Permanent { message: String },
}

impl FetchError {
    pub fn rate_limited(reset_at: DateTime<Utc>) -> Self {
        Self::RateLimited { reset_at }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::RateLimited { .. } => ErrorKind::RateLimited,
            FetchError::Transient { .. } => ErrorKind::Transient,
            FetchError::Permanent { .. } => ErrorKind::Permanent,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("subscription encoding error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,

    #[error("unknown job {0}")]
    UnknownJob(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("destination notification failed: {message}")]
pub struct DestinationError {
    pub message: String,
}

impl DestinationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error surfaced by handling one job.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetching {task} page failed: {source}")]
    Fetch {
        task: TaskKind,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Fetch { source, .. } => source.kind(),
            SyncError::Store(_) | SyncError::Queue(_) => ErrorKind::Infrastructure,
        }
    }

    /// The fetch error, when the failure came from the source system.
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            SyncError::Fetch { source, .. } => Some(source),
            _ => None,
        }
    }
}
