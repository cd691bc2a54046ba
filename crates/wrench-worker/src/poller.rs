//! Waiting for deferred work on a project.
//!
//! When the service answers an apply with `pending`, the operations run in the
//! background. Exporting before they finish would return a partially
//! transformed dataset, so the runner waits here until the service reports no
//! more processes for the project.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use wrench_client::RefineApi;
use wrench_core::ProjectId;

use crate::config::PollConfig;
use crate::error::PipelineError;

/// Polls process status until a project is idle.
#[derive(Debug, Clone)]
pub struct CompletionPoller {
    interval: Duration,
    timeout: Option<Duration>,
}

impl CompletionPoller {
    /// Create a new poller.
    pub fn new(config: &PollConfig) -> Self {
        Self {
            interval: config.interval,
            timeout: config.timeout,
        }
    }

    /// Block until the service reports zero processes for `project`.
    ///
    /// Only a count of exactly zero ends the wait; a falling count is logged
    /// and polling continues. Without a configured timeout this waits for as
    /// long as the service keeps work running.
    pub async fn wait_until_idle(
        &self,
        api: &dyn RefineApi,
        project: &ProjectId,
    ) -> Result<(), PipelineError> {
        info!(project_id = %project, "Waiting for project async processes");

        let started = Instant::now();
        let mut last: Option<usize> = None;

        loop {
            let count = api.get_process_count(project).await?;

            if last.map_or(true, |prev| count < prev) {
                info!(project_id = %project, processes = count, "Async processes running");
            } else {
                debug!(project_id = %project, processes = count, "Async processes unchanged");
            }
            last = Some(count);

            if count == 0 {
                info!(project_id = %project, "No more async processes");
                return Ok(());
            }

            if let Some(limit) = self.timeout {
                let waited = started.elapsed();
                if waited >= limit {
                    return Err(PipelineError::PollTimeout {
                        project: project.clone(),
                        remaining: count,
                        waited,
                    });
                }
            }

            sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedApi;

    fn poller(timeout: Option<Duration>) -> CompletionPoller {
        CompletionPoller::new(&PollConfig {
            interval: Duration::from_secs(1),
            timeout,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_first_zero() {
        let api = ScriptedApi::new().with_process_counts(&[3, 3, 1, 0, 7]);
        let started = Instant::now();

        poller(None)
            .wait_until_idle(&api, &ProjectId::new("1"))
            .await
            .unwrap();

        assert_eq!(api.count_calls("processes"), 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_decrease_does_not_end_wait() {
        let api = ScriptedApi::new().with_process_counts(&[5, 2, 1, 1, 0]);

        poller(None)
            .wait_until_idle(&api, &ProjectId::new("1"))
            .await
            .unwrap();

        assert_eq!(api.count_calls("processes"), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_project_needs_single_query() {
        let api = ScriptedApi::new().with_process_counts(&[0]);

        poller(None)
            .wait_until_idle(&api, &ProjectId::new("1"))
            .await
            .unwrap();

        assert_eq!(api.count_calls("processes"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_remaining_processes() {
        let api = ScriptedApi::new().with_process_counts(&[4, 2]);

        let err = poller(Some(Duration::from_secs(3)))
            .wait_until_idle(&api, &ProjectId::new("9"))
            .await
            .unwrap_err();

        match err {
            PipelineError::PollTimeout {
                project,
                remaining,
                waited,
            } => {
                assert_eq!(project.as_str(), "9");
                assert_eq!(remaining, 2);
                assert!(waited >= Duration::from_secs(3));
            }
            other => panic!("expected PollTimeout, got {:?}", other),
        }
        assert_eq!(api.count_calls("processes"), 4);
    }
}
