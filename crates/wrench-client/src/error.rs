//! Error types for the refine client.

use thiserror::Error;

use wrench_core::CoreError;

/// Errors that can occur when talking to the refine service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP transport error (unreachable host, reset, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Export returned no usable payload.
    #[error("export failed: {0}")]
    Export(String),

    /// Local file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request body could not be built.
    #[error("serialization error: {0}")]
    Serialization(#[from] CoreError),
}

impl ClientError {
    /// True for errors that mean the service could not be reached or did not
    /// answer in time.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_))
    }

    /// True if the request hit the configured per-request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }
}
