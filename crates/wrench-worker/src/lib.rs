//! refinery-wrench pipeline engine.
//!
//! - [`CompletionPoller`] waits out deferred operations on a project.
//! - [`PipelineRunner`] takes one file through create, apply, export and
//!   delete, returning a [`wrench_core::PipelineOutcome`].
//! - [`Orchestrator`] runs a batch of tasks over a bounded worker pool.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod poller;
pub mod runner;

#[cfg(test)]
mod test_support;

pub use config::{EngineConfig, PollConfig};
pub use error::{OrchestratorError, PipelineError};
pub use orchestrator::Orchestrator;
pub use poller::CompletionPoller;
pub use runner::PipelineRunner;
