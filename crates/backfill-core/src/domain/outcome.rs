//! Outcome of applying one fetched page, and the report of one handled job.

use serde::{Deserialize, Serialize};

use super::ids::{JobId, RepositoryId};
use super::page::Cursor;
use super::task_kind::TaskKind;

/// What the status updater decided after applying a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "cursor", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepOutcome {
    /// More pages for the same (repository, task); resume from `cursor`.
    Continue(Cursor),
    /// That walk finished but other work is pending for the installation.
    TaskComplete,
    /// Nothing left for the whole installation.
    InstallationComplete,
}

/// What the orchestrator did with one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepReport {
    /// Installation no longer has a subscription.
    SubscriptionMissing,
    /// Late or duplicate trigger: nothing pending.
    NothingToDo,
    /// One page was fetched and applied.
    Advanced {
        repository: RepositoryId,
        task: TaskKind,
        items: usize,
        outcome: StepOutcome,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        continuation: Option<JobId>,
    },
}

impl StepReport {
    pub fn outcome(&self) -> Option<&StepOutcome> {
        match self {
            StepReport::Advanced { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_with_screaming_names() {
        let v = serde_json::to_value(StepOutcome::Continue(Cursor::new("abc"))).unwrap();
        assert_eq!(v["outcome"], "CONTINUE");
        assert_eq!(v["cursor"], "abc");

        let v = serde_json::to_value(StepOutcome::InstallationComplete).unwrap();
        assert_eq!(v["outcome"], "INSTALLATION_COMPLETE");
    }

    #[test]
    fn report_exposes_outcome_only_when_advanced() {
        assert_eq!(StepReport::NothingToDo.outcome(), None);

        let report = StepReport::Advanced {
            repository: RepositoryId::new(1),
            task: TaskKind::Commit,
            items: 0,
            outcome: StepOutcome::TaskComplete,
            continuation: None,
        };
        assert_eq!(report.outcome(), Some(&StepOutcome::TaskComplete));
    }
}
