//! TaskKind - the closed set of data categories we mirror.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One mirrored data category.
///
/// The declaration order is the catalog order: for a given repository pull
/// requests are walked first, then branches, then commits. `ALL` must stay in
/// the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskKind {
    #[serde(rename = "pull")]
    PullRequest,
    #[serde(rename = "branch")]
    Branch,
    #[serde(rename = "commit")]
    Commit,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::PullRequest, TaskKind::Branch, TaskKind::Commit];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::PullRequest => "pull",
            TaskKind::Branch => "branch",
            TaskKind::Commit => "commit",
        }
    }

    /// Name of the queue jobs of this kind are delivered on.
    pub fn queue_name(self) -> &'static str {
        match self {
            TaskKind::PullRequest => "pull-requests",
            TaskKind::Branch => "branches",
            TaskKind::Commit => "commits",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task kind '{0}' (expected pull, branch or commit)")]
pub struct UnknownTaskKind(pub String);

impl FromStr for TaskKind {
    type Err = UnknownTaskKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownTaskKind(s.to_string()))
    }
}
