//! Client configuration.

use std::time::Duration;

/// Refine service connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the service, e.g. `http://localhost:3333`.
    pub base_url: String,

    /// Per-request timeout. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Settings for `http://<host>:<port>` with the default timeout.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            base_url: format!("http://{}:{}", host, port),
            ..Self::default()
        }
    }

    /// Builder method to set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3333".to_string(),
            request_timeout: Some(Duration::from_secs(60)),
        }
    }
}
