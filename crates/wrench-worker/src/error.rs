//! Engine errors.

use std::time::Duration;

use thiserror::Error;

use wrench_client::ClientError;
use wrench_core::{BatchSummary, CoreError, FailureKind, ProjectId};

/// Errors that stop a single pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Service call failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Apply answered with a code other than `ok` or `pending`.
    #[error("operations rejected with code '{0}'")]
    ApplyRejected(String),

    /// Deferred work outlived the configured poll timeout.
    #[error("project {project} still had {remaining} async processes after {waited:?}")]
    PollTimeout {
        project: ProjectId,
        remaining: usize,
        waited: Duration,
    },

    /// Delete answered with a code other than `ok`.
    #[error("delete returned code '{0}'")]
    DeleteRejected(String),

    /// Export file could not be written.
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),

    /// Project lifecycle moved out of order.
    #[error(transparent)]
    State(#[from] CoreError),
}

impl PipelineError {
    /// Classify the error for the pipeline outcome.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Client(e) if e.is_transport() => FailureKind::Transport,
            Self::Client(ClientError::Export(_)) => FailureKind::Export,
            Self::Client(ClientError::Io(_)) => FailureKind::Io,
            Self::Client(_) => FailureKind::Protocol,
            Self::ApplyRejected(code) => FailureKind::ApplyRejected(code.clone()),
            Self::PollTimeout { .. } => FailureKind::PollTimeout,
            Self::DeleteRejected(code) => FailureKind::DeleteRejected(code.clone()),
            Self::Io(_) => FailureKind::Io,
            Self::State(_) => FailureKind::InvalidState,
        }
    }
}

/// Errors that fail a whole batch run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A worker task panicked or was aborted. The surviving workers finish
    /// their current pipeline; `completed` holds every outcome that arrived.
    #[error("worker crashed: {message}")]
    WorkerCrashed {
        message: String,
        completed: BatchSummary,
    },

    /// The task queue closed before every task was queued.
    #[error("task queue closed")]
    QueueClosed,

    /// The result channel closed before every outcome arrived.
    #[error("result channel closed after {received} of {expected} outcomes")]
    ResultChannelClosed { expected: usize, received: usize },
}
