//! Engine configuration.

use std::time::Duration;

/// How the completion poller waits for deferred work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause between two process-status queries.
    pub interval: Duration,

    /// Give up once this much time has passed. `None` waits until the
    /// service reports no more processes, however long that takes.
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: None,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of pipelines running at once.
    pub max_workers: usize,

    /// Completion poller settings.
    pub poll: PollConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: 1,
            poll: PollConfig::default(),
        }
    }
}
