//! Lifecycle states and stage dispositions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a remote project.
///
/// States are ordered; a project only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectState {
    /// Project exists on the service.
    Created,
    /// Operation batch applied and any deferred work finished.
    Applied,
    /// Rows exported to the local target.
    Exported,
    /// Project removed from the service.
    Deleted,
}

impl ProjectState {
    /// Returns true if `next` lies strictly ahead of this state.
    ///
    /// Stages may be skipped (a failed export still ends in `Deleted`), but
    /// never revisited.
    pub fn can_advance_to(&self, next: ProjectState) -> bool {
        next > *self
    }

    /// Returns true once the project no longer exists remotely.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

impl fmt::Display for ProjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "CREATED",
            Self::Applied => "APPLIED",
            Self::Exported => "EXPORTED",
            Self::Deleted => "DELETED",
        };
        f.write_str(s)
    }
}

/// Disposition of an apply-operations call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyOutcome {
    /// The service applied the batch synchronously.
    Accepted,
    /// The service queued the batch; completion must be polled.
    Pending,
    /// The service refused the batch with the given code.
    Rejected(String),
}

impl ApplyOutcome {
    /// Map the service's `code` field onto an outcome.
    pub fn from_code(code: &str) -> Self {
        match code {
            "ok" => Self::Accepted,
            "pending" => Self::Pending,
            other => Self::Rejected(other.to_string()),
        }
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => f.write_str("ok"),
            Self::Pending => f.write_str("pending"),
            Self::Rejected(code) => write!(f, "rejected ({})", code),
        }
    }
}
