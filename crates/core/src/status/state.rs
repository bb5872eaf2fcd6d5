use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a job as shown to the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Generating,
    Loading,
    Delivered,
    Errored,
}

impl JobStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Generating => 1,
            Self::Loading => 2,
            Self::Delivered => 3,
            Self::Errored => 4,
        }
    }

    /// Delivered and Errored are absorbing.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Errored)
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// Transitions only move forward; Errored is reachable from any
    /// non-terminal state.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Errored => true,
            Self::Queued => false,
            _ => next.rank() > self.rank(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Generating => "generating",
            Self::Loading => "loading",
            Self::Delivered => "delivered",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
