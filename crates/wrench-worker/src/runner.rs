//! Drives one source file through create, apply, export and delete.
//!
//! A run never panics and never returns an error: every problem ends up in
//! the returned [`PipelineOutcome`]. Once a project exists on the service it
//! is deleted again, whatever happened in between.

use std::sync::Arc;

use tracing::{error, info, warn};

use wrench_client::RefineApi;
use wrench_core::{
    ApplyOutcome, PipelineFailure, PipelineOutcome, PipelineTask, ProjectName, ProjectState,
    RemoteProject, Stage,
};

use crate::config::PollConfig;
use crate::error::PipelineError;
use crate::poller::CompletionPoller;

/// Runs pipelines against a refine service.
///
/// Holds no per-task state, so a single runner is shared by every worker.
pub struct PipelineRunner {
    api: Arc<dyn RefineApi>,
    poller: CompletionPoller,
}

impl PipelineRunner {
    /// Create a new runner.
    pub fn new(api: Arc<dyn RefineApi>, poll: &PollConfig) -> Self {
        Self {
            api,
            poller: CompletionPoller::new(poll),
        }
    }

    /// Run the full pipeline for one task.
    pub async fn run(&self, task: &PipelineTask) -> PipelineOutcome {
        let mut outcome = PipelineOutcome::start(task);
        let name = ProjectName::for_source(&task.source);
        outcome.project_name = Some(name.clone());

        info!(
            file = %task.source.display(),
            project_name = %name,
            "Creating project"
        );

        let id = match self
            .api
            .create_project(&task.source, &name, task.source_format, &task.options)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                let e = PipelineError::from(e);
                error!(file = %task.source.display(), error = %e, "Failed to create project");
                outcome.fail(PipelineFailure::new(Stage::Create, e.kind(), e.to_string()));
                outcome.finish();
                return outcome;
            }
        };

        info!(project_id = %id, project_name = %name, "Project created");
        outcome.project_id = Some(id.clone());
        let mut project = RemoteProject::created(id, name, task.source.clone());

        if let Err((stage, e)) = self.process(task, &mut project, &mut outcome).await {
            error!(project_id = %project.id, stage = %stage, error = %e, "Pipeline stage failed");
            outcome.fail(PipelineFailure::new(stage, e.kind(), e.to_string()));
        }

        if let Err(e) = self.cleanup(&mut project).await {
            if outcome.is_success() {
                error!(project_id = %project.id, error = %e, "Failed to delete project");
                outcome.fail(PipelineFailure::new(Stage::Delete, e.kind(), e.to_string()));
            } else {
                warn!(project_id = %project.id, error = %e, "Cleanup after failure did not delete project");
                outcome.cleanup_error = Some(e.to_string());
            }
        }

        outcome.reached = Some(project.state());
        outcome.finish();

        info!(
            project_id = %project.id,
            state = %project.state(),
            success = outcome.is_success(),
            "Pipeline finished"
        );
        outcome
    }

    /// Apply the batch and export the result.
    async fn process(
        &self,
        task: &PipelineTask,
        project: &mut RemoteProject,
        outcome: &mut PipelineOutcome,
    ) -> Result<(), (Stage, PipelineError)> {
        self.apply(task, project)
            .await
            .map_err(|e| (Stage::Apply, e))?;

        let path = self
            .export(task, project)
            .await
            .map_err(|e| (Stage::Export, e))?;
        outcome.export_path = Some(path);
        Ok(())
    }

    async fn apply(
        &self,
        task: &PipelineTask,
        project: &mut RemoteProject,
    ) -> Result<(), PipelineError> {
        info!(
            project_id = %project.id,
            operations = task.batch.len(),
            "Applying operations"
        );

        match self.api.apply_operations(&project.id, &task.batch).await? {
            ApplyOutcome::Accepted => {}
            ApplyOutcome::Pending => {
                self.poller
                    .wait_until_idle(self.api.as_ref(), &project.id)
                    .await?;
            }
            ApplyOutcome::Rejected(code) => return Err(PipelineError::ApplyRejected(code)),
        }

        project.advance(ProjectState::Applied)?;
        Ok(())
    }

    async fn export(
        &self,
        task: &PipelineTask,
        project: &mut RemoteProject,
    ) -> Result<std::path::PathBuf, PipelineError> {
        info!(
            project_id = %project.id,
            format = task.export_format.as_str(),
            "Exporting rows"
        );

        let body = self.api.export_rows(&project.id, task.export_format).await?;

        let path = task.export_path();
        tokio::fs::create_dir_all(&task.export_dir).await?;
        tokio::fs::write(&path, body.as_bytes()).await?;

        info!(
            project_id = %project.id,
            path = %path.display(),
            bytes = body.len(),
            "Export written"
        );

        project.advance(ProjectState::Exported)?;
        Ok(path)
    }

    async fn cleanup(&self, project: &mut RemoteProject) -> Result<(), PipelineError> {
        info!(project_id = %project.id, "Deleting project");

        let code = self.api.delete_project(&project.id).await?;
        if code != "ok" {
            return Err(PipelineError::DeleteRejected(code));
        }

        project.advance(ProjectState::Deleted)?;
        info!(project_id = %project.id, "Project deleted");
        Ok(())
    }
}
