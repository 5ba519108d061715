//! SyncJob: the immutable unit of work carried by the queue.

use serde::{Deserialize, Serialize};

use super::ids::{DestinationHost, InstallationId, JobId};
use super::subscription::{Installation, Repository};
use super::task_kind::TaskKind;

/// Queue-side retention options.
///
/// Copied verbatim onto every continuation of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeliveryOptions {
    /// Drop the job record from the queue once it succeeded.
    #[serde(default)]
    pub remove_on_complete: bool,
    /// Drop the job record from the queue once it is dead-lettered.
    #[serde(default)]
    pub remove_on_fail: bool,
}

impl DeliveryOptions {
    pub fn new(remove_on_complete: bool, remove_on_fail: bool) -> Self {
        Self {
            remove_on_complete,
            remove_on_fail,
        }
    }
}

/// Work descriptor: "advance this installation by one page".
///
/// `repository` and `task` describe what the producer meant to do, but the
/// orchestrator always re-derives the actual (repository, task) from freshly
/// loaded state. Treat them as hints for logging and queue routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub job_id: JobId,
    pub installation_id: InstallationId,
    pub destination_host: DestinationHost,
    pub repository: Repository,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskKind>,
    #[serde(default)]
    pub delivery: DeliveryOptions,
}

impl SyncJob {
    pub fn new(
        job_id: JobId,
        installation: &Installation,
        repository: Repository,
        task: TaskKind,
        delivery: DeliveryOptions,
    ) -> Self {
        Self {
            job_id,
            installation_id: installation.installation_id,
            destination_host: installation.destination_host.clone(),
            repository,
            task: Some(task),
            delivery,
        }
    }

    /// Next job in the chain: same installation identity and delivery options,
    /// repository and task taken from the state that was just saved.
    pub fn continuation(&self, job_id: JobId, repository: Repository, task: TaskKind) -> Self {
        Self {
            job_id,
            installation_id: self.installation_id,
            destination_host: self.destination_host.clone(),
            repository,
            task: Some(task),
            delivery: self.delivery,
        }
    }
}
