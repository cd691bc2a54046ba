//! Scripted in-memory `RefineApi` for engine tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use wrench_client::{ClientError, RefineApi};
use wrench_core::{
    ApplyOutcome, ExportFormat, ImportOptions, OperationBatch, PipelineTask, ProjectId,
    ProjectName, SourceFormat,
};

pub struct ScriptedApi {
    apply: ApplyOutcome,
    process_counts: Mutex<VecDeque<usize>>,
    export_body: Option<String>,
    delete_code: String,
    fail_create_for: Option<String>,
    panic_create_for: Option<String>,
    delay: Duration,
    next_id: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
    created_names: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            apply: ApplyOutcome::Accepted,
            process_counts: Mutex::new(VecDeque::new()),
            export_body: Some("first_name,last_name\nBaked,BEANS\n".to_string()),
            delete_code: "ok".to_string(),
            fail_create_for: None,
            panic_create_for: None,
            delay: Duration::ZERO,
            next_id: AtomicU64::new(1),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            created_names: Mutex::new(Vec::new()),
        }
    }

    pub fn with_apply(mut self, outcome: ApplyOutcome) -> Self {
        self.apply = outcome;
        self
    }

    /// Counts reported by successive status queries; the last one repeats.
    pub fn with_process_counts(self, counts: &[usize]) -> Self {
        *self.process_counts.lock().unwrap() = counts.iter().copied().collect();
        self
    }

    pub fn with_empty_export(mut self) -> Self {
        self.export_body = None;
        self
    }

    pub fn with_delete_code(mut self, code: &str) -> Self {
        self.delete_code = code.to_string();
        self
    }

    /// Fail project creation with a transport error for files with this stem.
    pub fn failing_create_for(mut self, stem: &str) -> Self {
        self.fail_create_for = Some(stem.to_string());
        self
    }

    pub fn panicking_create_for(mut self, stem: &str) -> Self {
        self.panic_create_for = Some(stem.to_string());
        self
    }

    /// Latency added to create and export calls.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == name).count()
    }

    pub fn created_names(&self) -> Vec<String> {
        self.created_names.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl RefineApi for ScriptedApi {
    async fn create_project(
        &self,
        file: &Path,
        name: &ProjectName,
        _format: SourceFormat,
        _options: &ImportOptions,
    ) -> Result<ProjectId, ClientError> {
        self.record("create");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let stem = stem(file);
        if self.panic_create_for.as_deref() == Some(stem.as_str()) {
            panic!("scripted panic for {}", stem);
        }
        if self.fail_create_for.as_deref() == Some(stem.as_str()) {
            return Err(transport_error());
        }

        self.created_names.lock().unwrap().push(name.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(ProjectId::new(id.to_string()))
    }

    async fn apply_operations(
        &self,
        _project: &ProjectId,
        _batch: &OperationBatch,
    ) -> Result<ApplyOutcome, ClientError> {
        self.record("apply");
        Ok(self.apply.clone())
    }

    async fn export_rows(
        &self,
        project: &ProjectId,
        _format: ExportFormat,
    ) -> Result<String, ClientError> {
        self.record("export");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.export_body
            .clone()
            .ok_or_else(|| ClientError::Export(format!("empty export for project {}", project)))
    }

    async fn delete_project(&self, _project: &ProjectId) -> Result<String, ClientError> {
        self.record("delete");
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.delete_code.clone())
    }

    async fn get_process_count(&self, _project: &ProjectId) -> Result<usize, ClientError> {
        self.record("processes");
        let mut counts = self.process_counts.lock().unwrap();
        let count = if counts.len() > 1 {
            counts.pop_front().unwrap_or(0)
        } else {
            counts.front().copied().unwrap_or(0)
        };
        Ok(count)
    }
}

/// Fresh export directory, removed when dropped.
pub fn temp_export_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// A real transport error, as reqwest reports an unusable request URL.
pub fn transport_error() -> ClientError {
    let err = reqwest::Client::new()
        .get("http://[::1")
        .build()
        .unwrap_err();
    ClientError::Http(err)
}

pub fn task_for(source: &str, export_dir: &Path) -> PipelineTask {
    PipelineTask::new(
        source,
        SourceFormat::Csv,
        Arc::new(ImportOptions::default()),
        OperationBatch::new(Vec::new()),
        export_dir,
    )
}
