//! HTTP client for the refine command endpoints.

use std::path::Path;

use reqwest::header::LOCATION;
use reqwest::multipart::{Form, Part};
use reqwest::redirect::Policy;
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use wrench_core::{
    ApplyOutcome, ExportFormat, ImportOptions, OperationBatch, ProjectId, ProjectName,
    SourceFormat,
};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::token::TokenProvider;

#[derive(Debug, Deserialize)]
struct CodeResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProcessesResponse {
    processes: Vec<serde_json::Value>,
}

/// Client for the refine service.
///
/// Every mutating call fetches its own CSRF token first. Nothing is retried.
#[derive(Clone)]
pub struct RefineClient {
    inner: reqwest::Client,
    base_url: String,
    tokens: TokenProvider,
}

impl RefineClient {
    /// Create a new client.
    ///
    /// Redirects are not followed: project creation answers with a redirect
    /// that carries the new project id.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder().redirect(Policy::none());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let inner = builder.build()?;
        let base_url = config.base_url.trim_end_matches('/').to_string();

        Ok(Self {
            tokens: TokenProvider::new(inner.clone(), &base_url),
            inner,
            base_url,
        })
    }

    /// Base URL of the service.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Token provider used for mutating calls.
    pub fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    fn command_url(&self, command: &str) -> String {
        format!("{}/command/core/{}", self.base_url, command)
    }

    /// Upload `file` and create a project named `name` from it.
    pub async fn create_project(
        &self,
        file: &Path,
        name: &ProjectName,
        format: SourceFormat,
        options: &ImportOptions,
    ) -> Result<ProjectId, ClientError> {
        let contents = tokio::fs::read(file).await?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());

        let mut form = Form::new()
            .text("project-name", name.to_string())
            .text("options", options.to_json_string()?);
        if let Some(hint) = format.format_hint() {
            form = form.text("format", hint);
        }
        form = form.part("project-file", Part::bytes(contents).file_name(file_name));

        let token = self.tokens.fetch_token().await?;
        let url = self.command_url("create-project-from-upload");
        debug!(url = %url, project_name = %name, "POST create project");

        let response = self
            .inner
            .post(&url)
            .query(&[("csrf_token", token.as_str())])
            .multipart(form)
            .send()
            .await?;

        let target = self.redirect_target(&response)?;
        let project_id = project_id_from_url(&target)?;

        info!(
            project_id = %project_id,
            file = %file.display(),
            "Created project"
        );
        Ok(project_id)
    }

    /// Apply an operation batch to a project.
    pub async fn apply_operations(
        &self,
        project: &ProjectId,
        batch: &OperationBatch,
    ) -> Result<ApplyOutcome, ClientError> {
        let operations = batch.to_json_string()?;
        let token = self.tokens.fetch_token().await?;

        let response = self
            .inner
            .post(self.command_url("apply-operations"))
            .query(&[("csrf_token", token.as_str())])
            .form(&[("project", project.as_str()), ("operations", operations.as_str())])
            .send()
            .await?;

        let body: CodeResponse = read_json(response, "apply-operations").await?;
        let outcome = ApplyOutcome::from_code(&body.code);

        match &outcome {
            ApplyOutcome::Accepted => info!(project_id = %project, "Applied operations"),
            ApplyOutcome::Pending => {
                info!(project_id = %project, "Operations accepted, processing deferred")
            }
            ApplyOutcome::Rejected(code) => warn!(
                project_id = %project,
                code = %code,
                detail = body.message.as_deref().unwrap_or(""),
                "Operations rejected"
            ),
        }

        Ok(outcome)
    }

    /// Export all rows of a project.
    pub async fn export_rows(
        &self,
        project: &ProjectId,
        format: ExportFormat,
    ) -> Result<String, ClientError> {
        let token = self.tokens.fetch_token().await?;

        let response = self
            .inner
            .post(self.command_url("export-rows"))
            .query(&[("csrf_token", token.as_str())])
            .form(&[("project", project.as_str()), ("format", format.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Export(format!(
                "HTTP {} exporting project {}",
                status, project
            )));
        }

        let body = response.text().await?;
        if body.is_empty() {
            return Err(ClientError::Export(format!(
                "empty export for project {}",
                project
            )));
        }

        info!(project_id = %project, bytes = body.len(), "Exported rows");
        Ok(body)
    }

    /// Delete a project, returning the service's disposition code.
    pub async fn delete_project(&self, project: &ProjectId) -> Result<String, ClientError> {
        let token = self.tokens.fetch_token().await?;

        let response = self
            .inner
            .post(self.command_url("delete-project"))
            .query(&[("csrf_token", token.as_str())])
            .form(&[("project", project.as_str())])
            .send()
            .await?;

        let body: CodeResponse = read_json(response, "delete-project").await?;
        if body.code == "ok" {
            info!(project_id = %project, "Deleted project");
        } else {
            warn!(
                project_id = %project,
                code = %body.code,
                detail = body.message.as_deref().unwrap_or(""),
                "Delete not confirmed"
            );
        }
        Ok(body.code)
    }

    /// Number of asynchronous processes still running for a project.
    pub async fn get_process_count(&self, project: &ProjectId) -> Result<usize, ClientError> {
        let response = self
            .inner
            .get(self.command_url("get-processes"))
            .query(&[("project", project.as_str())])
            .send()
            .await?;

        let body: ProcessesResponse = read_json(response, "get-processes").await?;
        Ok(body.processes.len())
    }

    fn redirect_target(&self, response: &Response) -> Result<Url, ClientError> {
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .ok_or_else(|| ClientError::Protocol("redirect without Location header".into()))?
                .to_str()
                .map_err(|e| ClientError::Protocol(format!("unreadable Location header: {}", e)))?;
            let base = Url::parse(&self.base_url)
                .map_err(|e| ClientError::Protocol(format!("invalid base URL: {}", e)))?;
            return base
                .join(location)
                .map_err(|e| ClientError::Protocol(format!("invalid redirect target: {}", e)));
        }

        if status.is_success() {
            return Ok(response.url().clone());
        }

        Err(ClientError::Protocol(format!(
            "HTTP {} from create-project-from-upload",
            status
        )))
    }
}

/// Read the project id from the `project` query parameter of `url`.
pub fn project_id_from_url(url: &Url) -> Result<ProjectId, ClientError> {
    url.query_pairs()
        .find(|(key, _)| key == "project")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .map(ProjectId::new)
        .ok_or_else(|| ClientError::Protocol(format!("no project id in '{}'", url)))
}

async fn read_json<T: DeserializeOwned>(response: Response, command: &str) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Protocol(format!(
            "HTTP {} from {}",
            status, command
        )));
    }

    response
        .json()
        .await
        .map_err(|e| ClientError::Protocol(format!("malformed {} response: {}", command, e)))
}
