//! Fixed-size worker pool running one pipeline per task.
//!
//! Tasks are queued up front on a closed channel. Each worker pulls the next
//! task, runs it to completion and pushes the outcome onto the result
//! channel, so at most `max_workers` projects exist on the service at once.
//! A failing pipeline never stops the others; only a crashed worker fails
//! the whole run.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

use wrench_client::RefineApi;
use wrench_core::{BatchSummary, PipelineOutcome, PipelineTask};

use crate::config::EngineConfig;
use crate::error::OrchestratorError;
use crate::runner::PipelineRunner;

type TaskQueue = Arc<Mutex<mpsc::Receiver<PipelineTask>>>;

/// Runs a batch of pipeline tasks over a bounded pool of workers.
pub struct Orchestrator {
    runner: Arc<PipelineRunner>,
    max_workers: usize,
}

impl Orchestrator {
    /// Create an orchestrator. A pool size of zero is treated as one.
    pub fn new(runner: Arc<PipelineRunner>, max_workers: usize) -> Self {
        Self {
            runner,
            max_workers: max_workers.max(1),
        }
    }

    /// Build the runner and pool from engine configuration.
    pub fn from_config(api: Arc<dyn RefineApi>, config: &EngineConfig) -> Self {
        let runner = Arc::new(PipelineRunner::new(api, &config.poll));
        Self::new(runner, config.max_workers)
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run every task and collect the outcomes.
    ///
    /// Outcomes arrive in completion order, not submission order.
    pub async fn run(&self, tasks: Vec<PipelineTask>) -> Result<BatchSummary, OrchestratorError> {
        let expected = tasks.len();
        if expected == 0 {
            info!("No tasks to run");
            return Ok(BatchSummary::default());
        }

        let workers = self.max_workers.min(expected);
        info!(tasks = expected, workers, "Starting batch");

        let (task_tx, task_rx) = mpsc::channel::<PipelineTask>(expected);
        for task in tasks {
            task_tx
                .send(task)
                .await
                .map_err(|_| OrchestratorError::QueueClosed)?;
        }
        drop(task_tx);

        let queue: TaskQueue = Arc::new(Mutex::new(task_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<PipelineOutcome>(expected);

        let mut join_set = JoinSet::new();
        for worker in 0..workers {
            let queue = queue.clone();
            let runner = self.runner.clone();
            let results = result_tx.clone();
            join_set.spawn(
                worker_loop(queue, runner, results).instrument(info_span!("worker", worker)),
            );
        }
        drop(result_tx);

        // Pipelines already running must reach their delete stage, so a crash
        // only stops further tasks from being picked up.
        let mut crash: Option<String> = None;
        while let Some(joined) = join_set.join_next().await {
            if let Err(join_err) = joined {
                error!(error = %join_err, "Worker crashed");
                if crash.is_none() {
                    let skipped = drain_queue(&queue).await;
                    warn!(skipped, "Dropping queued tasks after worker crash");
                    crash = Some(join_err.to_string());
                }
            }
        }

        let mut outcomes = Vec::with_capacity(expected);
        while let Some(outcome) = result_rx.recv().await {
            outcomes.push(outcome);
        }

        if let Some(message) = crash {
            return Err(OrchestratorError::WorkerCrashed {
                message,
                completed: BatchSummary::new(outcomes),
            });
        }

        if outcomes.len() != expected {
            return Err(OrchestratorError::ResultChannelClosed {
                expected,
                received: outcomes.len(),
            });
        }

        let summary = BatchSummary::new(outcomes);
        info!(
            succeeded = summary.success_count(),
            failed = summary.failure_count(),
            "Batch finished"
        );
        Ok(summary)
    }
}

/// Discard tasks no worker has picked up yet.
async fn drain_queue(queue: &TaskQueue) -> usize {
    let mut rx = queue.lock().await;
    let mut skipped = 0;
    while rx.try_recv().is_ok() {
        skipped += 1;
    }
    skipped
}

async fn worker_loop(
    queue: TaskQueue,
    runner: Arc<PipelineRunner>,
    results: mpsc::Sender<PipelineOutcome>,
) {
    let mut handled = 0usize;

    loop {
        let next = queue.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };

        let span = info_span!(
            "task",
            task_id = %task.id,
            file = %task.source.display()
        );
        let outcome = runner.run(&task).instrument(span).await;
        handled += 1;

        if results.send(outcome).await.is_err() {
            warn!("Result channel closed, stopping worker");
            break;
        }
    }

    debug!(handled, "Worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    use tempfile::TempDir;
    use wrench_core::Stage;

    use crate::config::PollConfig;
    use crate::test_support::{task_for, temp_export_dir, ScriptedApi};

    fn orchestrator(api: Arc<ScriptedApi>, workers: usize) -> Orchestrator {
        Orchestrator::from_config(
            api,
            &EngineConfig {
                max_workers: workers,
                poll: PollConfig {
                    interval: Duration::from_millis(5),
                    timeout: None,
                },
            },
        )
    }

    fn tasks(dir: &TempDir, stems: &[&str]) -> Vec<PipelineTask> {
        stems
            .iter()
            .map(|stem| task_for(&format!("in/{}.csv", stem), dir.path()))
            .collect()
    }

    #[tokio::test]
    async fn test_never_exceeds_pool_size() {
        let api = Arc::new(ScriptedApi::new().with_delay(Duration::from_millis(5)));
        let stems: Vec<String> = (0..10).map(|i| format!("file{}", i)).collect();
        let stems: Vec<&str> = stems.iter().map(String::as_str).collect();
        let dir = temp_export_dir();

        let summary = orchestrator(api.clone(), 3).run(tasks(&dir, &stems)).await.unwrap();

        assert_eq!(summary.len(), 10);
        assert_eq!(summary.success_count(), 10);
        assert!(api.max_in_flight() <= 3, "max in flight {}", api.max_in_flight());
        assert!(api.max_in_flight() >= 1);
        assert_eq!(api.count_calls("delete"), 10);
    }

    #[tokio::test]
    async fn test_failed_create_does_not_affect_others() {
        let api = Arc::new(ScriptedApi::new().failing_create_for("broken"));
        let dir = temp_export_dir();

        let summary = orchestrator(api.clone(), 2)
            .run(tasks(&dir, &["a", "b", "broken", "c", "d"]))
            .await
            .unwrap();

        assert_eq!(summary.success_count(), 4);
        assert_eq!(summary.failure_count(), 1);

        let failed: Vec<_> = summary.failed().collect();
        assert!(failed[0].source.ends_with("broken.csv"));
        assert_eq!(failed[0].failure.as_ref().unwrap().stage, Stage::Create);
        assert_eq!(api.count_calls("delete"), 4);
    }

    #[tokio::test]
    async fn test_worker_panic_fails_run() {
        let api = Arc::new(ScriptedApi::new().panicking_create_for("boom"));
        let dir = temp_export_dir();

        let err = orchestrator(api, 2)
            .run(tasks(&dir, &["a", "boom", "b"]))
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::WorkerCrashed { .. }));
    }

    #[tokio::test]
    async fn test_worker_panic_still_deletes_running_projects() {
        let api = Arc::new(
            ScriptedApi::new()
                .panicking_create_for("boom")
                .with_delay(Duration::from_millis(50)),
        );
        let dir = temp_export_dir();

        let err = orchestrator(api.clone(), 2)
            .run(tasks(&dir, &["a", "boom"]))
            .await
            .unwrap_err();

        let OrchestratorError::WorkerCrashed { completed, .. } = err else {
            panic!("expected WorkerCrashed, got {:?}", err);
        };
        assert_eq!(api.created_names().len(), 1);
        assert_eq!(api.count_calls("delete"), api.created_names().len());
        assert_eq!(completed.len(), 1);
        assert!(completed.outcomes[0].source.ends_with("a.csv"));
        assert!(completed.outcomes[0].is_success());
    }

    #[tokio::test]
    async fn test_worker_panic_skips_queued_tasks() {
        let api = Arc::new(
            ScriptedApi::new()
                .panicking_create_for("boom")
                .with_delay(Duration::from_millis(20)),
        );
        let dir = temp_export_dir();

        let err = orchestrator(api.clone(), 1)
            .run(tasks(&dir, &["boom", "later1", "later2"]))
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::WorkerCrashed { .. }));
        assert_eq!(api.count_calls("create"), 1);
        assert!(api.created_names().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let api = Arc::new(ScriptedApi::new());

        let summary = orchestrator(api.clone(), 4).run(Vec::new()).await.unwrap();

        assert!(summary.is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_identical_stems_get_distinct_names() {
        let api = Arc::new(ScriptedApi::new());
        let dirs: Vec<TempDir> = (0..6).map(|_| temp_export_dir()).collect();
        let batch: Vec<PipelineTask> = dirs
            .iter()
            .map(|dir| task_for("in/dup.csv", dir.path()))
            .collect();

        let summary = orchestrator(api.clone(), 6).run(batch).await.unwrap();
        assert_eq!(summary.success_count(), 6);

        let names = api.created_names();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), 6);
        assert_eq!(unique.len(), 6);
        assert!(names.iter().all(|n| n.starts_with("dup_")));
    }

    #[test]
    fn test_zero_workers_means_one() {
        let api = Arc::new(ScriptedApi::new());
        assert_eq!(orchestrator(api, 0).max_workers(), 1);
    }
}
