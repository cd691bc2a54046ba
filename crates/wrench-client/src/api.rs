//! The service operations the engine depends on.

use std::path::Path;

use async_trait::async_trait;

use wrench_core::{
    ApplyOutcome, ExportFormat, ImportOptions, OperationBatch, ProjectId, ProjectName,
    SourceFormat,
};

use crate::error::ClientError;
use crate::http::RefineClient;

/// Project lifecycle operations against a refine service.
///
/// Implemented by [`RefineClient`]; the pipeline engine only sees this trait.
#[async_trait]
pub trait RefineApi: Send + Sync {
    /// Create a project from `file`.
    async fn create_project(
        &self,
        file: &Path,
        name: &ProjectName,
        format: SourceFormat,
        options: &ImportOptions,
    ) -> Result<ProjectId, ClientError>;

    /// Apply an operation batch.
    async fn apply_operations(
        &self,
        project: &ProjectId,
        batch: &OperationBatch,
    ) -> Result<ApplyOutcome, ClientError>;

    /// Export every row of the project.
    async fn export_rows(
        &self,
        project: &ProjectId,
        format: ExportFormat,
    ) -> Result<String, ClientError>;

    /// Delete the project, returning the disposition code.
    async fn delete_project(&self, project: &ProjectId) -> Result<String, ClientError>;

    /// Number of asynchronous processes running for the project.
    async fn get_process_count(&self, project: &ProjectId) -> Result<usize, ClientError>;
}

#[async_trait]
impl RefineApi for RefineClient {
    async fn create_project(
        &self,
        file: &Path,
        name: &ProjectName,
        format: SourceFormat,
        options: &ImportOptions,
    ) -> Result<ProjectId, ClientError> {
        RefineClient::create_project(self, file, name, format, options).await
    }

    async fn apply_operations(
        &self,
        project: &ProjectId,
        batch: &OperationBatch,
    ) -> Result<ApplyOutcome, ClientError> {
        RefineClient::apply_operations(self, project, batch).await
    }

    async fn export_rows(
        &self,
        project: &ProjectId,
        format: ExportFormat,
    ) -> Result<String, ClientError> {
        RefineClient::export_rows(self, project, format).await
    }

    async fn delete_project(&self, project: &ProjectId) -> Result<String, ClientError> {
        RefineClient::delete_project(self, project).await
    }

    async fn get_process_count(&self, project: &ProjectId) -> Result<usize, ClientError> {
        RefineClient::get_process_count(self, project).await
    }
}
