//! HTTP client for the refine service.
//!
//! Covers the project lifecycle (create, apply, export, delete), the process
//! status query used while waiting on deferred work, and the per-call CSRF
//! token those endpoints require.

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod token;

pub use api::RefineApi;
pub use config::ClientConfig;
pub use error::ClientError;
pub use http::{project_id_from_url, RefineClient};
pub use token::{AuthToken, TokenProvider};
