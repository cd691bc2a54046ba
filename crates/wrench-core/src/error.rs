//! Core domain errors.

use thiserror::Error;

/// Core domain errors for refinery-wrench.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid lifecycle transition on a remote project.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Unknown source or export format.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Operation batch is not a JSON array of descriptors.
    #[error("Invalid operation batch: {0}")]
    InvalidBatch(String),

    /// Import option overrides failed validation.
    #[error("Invalid import options: {0}")]
    InvalidOptions(String),

    /// Two tasks of one batch would write the same export file.
    #[error("Export collision: {first} and {second} both export to {target}")]
    ExportCollision {
        target: String,
        first: String,
        second: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}
