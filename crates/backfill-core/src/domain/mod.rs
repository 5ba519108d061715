//! Domain model: ids, subscription state, jobs, pages, selection and
//! failure decisions. Nothing in here does I/O.

pub mod decision;
pub mod errors;
pub mod ids;
pub mod job;
pub mod outcome;
pub mod page;
pub mod selector;
pub mod subscription;
pub mod task_kind;

pub use decision::{Decider, Decision, DefaultDecider, Failure, FailureHistory, RetryPolicy};
pub use errors::{
    DestinationError, ErrorKind, FetchError, QueueError, StoreError, SyncError,
};
pub use ids::{DestinationHost, InstallationId, JobId, RepositoryId};
pub use job::{DeliveryOptions, SyncJob};
pub use outcome::{StepOutcome, StepReport};
pub use page::{Cursor, PageItem, ResultPage};
pub use selector::{NextTask, select_next};
pub use subscription::{
    Installation, RepoStatus, RepoSyncState, Repository, Subscription, SyncStatus, TaskProgress,
    TaskStatus,
};
pub use task_kind::TaskKind;
