//! refinery-wrench Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - The async runtime
//!
//! All types here describe the lifecycle of a remote refine project and the
//! tasks and outcomes the engine passes around.

pub mod batch;
pub mod error;
pub mod ids;
pub mod options;
pub mod project;
pub mod status;
pub mod task;

// Re-export commonly used types
pub use batch::OperationBatch;
pub use error::CoreError;
pub use ids::{ProjectId, ProjectName, TaskId};
pub use options::{ExportFormat, ImportOptions, SourceFormat};
pub use project::RemoteProject;
pub use status::{ApplyOutcome, ProjectState};
pub use task::{
    ensure_distinct_exports, BatchSummary, FailureKind, PipelineFailure, PipelineOutcome,
    PipelineTask, Stage,
};
