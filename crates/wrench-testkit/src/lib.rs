//! In-process fake of the refine command API.
//!
//! Serves the token, create, apply, process-status, export and delete
//! endpoints on a random local port. Projects hold delimited rows; the only
//! operations understood are `core/text-transform` with simple case and trim
//! expressions.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

mod handlers;
pub mod state;

pub use state::{FakeConfig, FakeProject, FakeState};

/// Create the router for the fake command API.
pub fn create_router(state: Arc<FakeState>) -> Router {
    Router::new()
        .route("/command/core/get-csrf-token", get(handlers::get_csrf_token))
        .route(
            "/command/core/create-project-from-upload",
            post(handlers::create_project),
        )
        .route("/command/core/apply-operations", post(handlers::apply_operations))
        .route("/command/core/get-processes", get(handlers::get_processes))
        .route("/command/core/export-rows", post(handlers::export_rows))
        .route("/command/core/delete-project", post(handlers::delete_project))
        .with_state(state)
}

/// A running fake service. Stops when dropped.
pub struct FakeRefine {
    base_url: String,
    state: Arc<FakeState>,
    handle: JoinHandle<()>,
}

impl FakeRefine {
    /// Start with default behaviour.
    pub async fn start() -> Self {
        Self::start_with(FakeConfig::default()).await
    }

    /// Start with the given behaviour.
    pub async fn start_with(config: FakeConfig) -> Self {
        let state = Arc::new(FakeState::new(config));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake refine listener");
        let addr = listener.local_addr().expect("fake refine local addr");
        let router = create_router(state.clone());

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
            handle,
        }
    }

    /// Base URL to point a client at.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Number of projects that currently exist.
    pub async fn live_projects(&self) -> usize {
        self.state.projects.read().await.len()
    }

    /// Ids of deleted projects.
    pub async fn deleted(&self) -> Vec<String> {
        self.state.deleted.read().await.clone()
    }

    /// Names passed at project creation, in creation order.
    pub async fn created_names(&self) -> Vec<String> {
        self.state.created_names.read().await.clone()
    }

    /// Rows of a live project.
    pub async fn rows(&self, project_id: &str) -> Option<Vec<Vec<String>>> {
        self.state
            .projects
            .read()
            .await
            .get(project_id)
            .map(|p| p.rows.clone())
    }

    /// Number of tokens handed out so far.
    pub fn token_requests(&self) -> usize {
        self.state.token_requests.load(Ordering::SeqCst)
    }
}

impl Drop for FakeRefine {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
