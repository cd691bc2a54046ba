//! Pipeline tasks and their outcomes.

use crate::{
    CoreError, ExportFormat, ImportOptions, OperationBatch, ProjectId, ProjectName, ProjectState,
    SourceFormat, TaskId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One file's trip through create, apply, export and delete.
#[derive(Debug, Clone)]
pub struct PipelineTask {
    /// Unique task identifier.
    pub id: TaskId,

    /// Source file uploaded to create the project.
    pub source: PathBuf,

    /// Format of the source file.
    pub source_format: SourceFormat,

    /// Import options, shared by every task of a batch.
    pub options: Arc<ImportOptions>,

    /// Operations applied to the project.
    pub batch: OperationBatch,

    /// Directory receiving the export.
    pub export_dir: PathBuf,

    /// Format of the exported rows.
    pub export_format: ExportFormat,
}

impl PipelineTask {
    /// Create a new PipelineTask exporting CSV.
    pub fn new(
        source: impl Into<PathBuf>,
        source_format: SourceFormat,
        options: Arc<ImportOptions>,
        batch: OperationBatch,
        export_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: TaskId::generate(),
            source: source.into(),
            source_format,
            options,
            batch,
            export_dir: export_dir.into(),
            export_format: ExportFormat::default(),
        }
    }

    /// Builder method to set the export format.
    pub fn with_export_format(mut self, format: ExportFormat) -> Self {
        self.export_format = format;
        self
    }

    /// Where the export lands: the source file name with the export extension,
    /// inside the export directory.
    pub fn export_path(&self) -> PathBuf {
        let file_name = self
            .source
            .file_name()
            .map(Path::new)
            .unwrap_or_else(|| Path::new("export"));
        self.export_dir
            .join(file_name.with_extension(self.export_format.extension()))
    }
}

/// Fail if two tasks would write the same export file.
///
/// Source discovery ignores extension case, so `a.csv` and `a.CSV` map to
/// one target and would overwrite each other's export.
pub fn ensure_distinct_exports(tasks: &[PipelineTask]) -> Result<(), CoreError> {
    let mut targets: HashMap<PathBuf, &Path> = HashMap::new();

    for task in tasks {
        let target = task.export_path();
        if let Some(first) = targets.get(&target) {
            return Err(CoreError::ExportCollision {
                target: target.display().to_string(),
                first: first.display().to_string(),
                second: task.source.display().to_string(),
            });
        }
        targets.insert(target, &task.source);
    }

    Ok(())
}

/// Pipeline stage at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Create,
    Apply,
    Export,
    Delete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Apply => "apply",
            Self::Export => "export",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Classification of a pipeline failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Service unreachable or request timed out.
    Transport,
    /// Response did not match the expected contract.
    Protocol,
    /// Apply answered with a code other than `ok` or `pending`.
    ApplyRejected(String),
    /// Export returned no usable payload.
    Export,
    /// Deferred work did not finish within the configured cap.
    PollTimeout,
    /// Local file could not be read or written.
    Io,
    /// Delete answered with a code other than `ok`.
    DeleteRejected(String),
    /// Lifecycle moved out of order.
    InvalidState,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => f.write_str("transport"),
            Self::Protocol => f.write_str("protocol"),
            Self::ApplyRejected(code) => write!(f, "apply rejected ({})", code),
            Self::Export => f.write_str("export"),
            Self::PollTimeout => f.write_str("poll timeout"),
            Self::Io => f.write_str("io"),
            Self::DeleteRejected(code) => write!(f, "delete rejected ({})", code),
            Self::InvalidState => f.write_str("invalid state"),
        }
    }
}

/// Why and where a pipeline stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineFailure {
    pub stage: Stage,
    pub kind: FailureKind,
    pub message: String,
}

impl PipelineFailure {
    pub fn new(stage: Stage, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed [{}]: {}", self.stage, self.kind, self.message)
    }
}

/// Structured result of one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// Task this outcome belongs to.
    pub task_id: TaskId,

    /// Source file of the task.
    pub source: PathBuf,

    /// Remote project, if one was created.
    pub project_id: Option<ProjectId>,

    /// Name the project was created with.
    pub project_name: Option<ProjectName>,

    /// Furthest lifecycle state reached.
    pub reached: Option<ProjectState>,

    /// Export file written, if the export stage succeeded.
    pub export_path: Option<PathBuf>,

    /// First failure, if any.
    pub failure: Option<PipelineFailure>,

    /// Problem deleting the project after an earlier failure.
    pub cleanup_error: Option<String>,

    /// When the pipeline started.
    pub started_at: DateTime<Utc>,

    /// When the pipeline finished.
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineOutcome {
    /// Start recording the outcome of a task.
    pub fn start(task: &PipelineTask) -> Self {
        Self {
            task_id: task.id.clone(),
            source: task.source.clone(),
            project_id: None,
            project_name: None,
            reached: None,
            export_path: None,
            failure: None,
            cleanup_error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record a failure. Only the first failure is kept.
    pub fn fail(&mut self, failure: PipelineFailure) {
        if self.failure.is_none() {
            self.failure = Some(failure);
        }
    }

    /// Mark the outcome as complete.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// True if every stage succeeded.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Outcomes of every task in a batch, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub outcomes: Vec<PipelineOutcome>,
}

impl BatchSummary {
    pub fn new(outcomes: Vec<PipelineOutcome>) -> Self {
        Self { outcomes }
    }

    /// Outcomes of tasks that completed every stage.
    pub fn succeeded(&self) -> impl Iterator<Item = &PipelineOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    /// Outcomes of tasks that failed at some stage.
    pub fn failed(&self) -> impl Iterator<Item = &PipelineOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
