//! Handlers for the fake command endpoints.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::state::{validate_operations, FakeProject, FakeState, PendingWork};

#[derive(Debug, Deserialize)]
pub struct CsrfQuery {
    csrf_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    project: String,
}

#[derive(Debug, Deserialize)]
pub struct ApplyForm {
    project: String,
    operations: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportForm {
    project: String,
    format: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectForm {
    project: String,
}

fn code_error(message: impl Into<String>) -> Json<Value> {
    Json(json!({ "code": "error", "message": message.into() }))
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        code_error("Missing or invalid csrf_token parameter"),
    )
        .into_response()
}

pub async fn get_csrf_token(State(state): State<Arc<FakeState>>) -> impl IntoResponse {
    state.delay().await;

    let token = Uuid::new_v4().simple().to_string();
    state.tokens.write().await.insert(token.clone());
    state.token_requests.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "token": token }))
}

pub async fn create_project(
    State(state): State<Arc<FakeState>>,
    Query(query): Query<CsrfQuery>,
    mut multipart: Multipart,
) -> Response {
    state.delay().await;

    if !state.token_valid(query.csrf_token.as_deref()).await {
        return forbidden();
    }

    let mut name = String::new();
    let mut separator = ",".to_string();
    let mut contents = String::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };
        let field_name = field.name().unwrap_or_default().to_string();
        let text = match field.text().await {
            Ok(text) => text,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };

        match field_name.as_str() {
            "project-name" => name = text,
            "project-file" => contents = text,
            "options" => {
                let options: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
                if let Some(sep) = options["separator"].as_str() {
                    separator = sep.to_string();
                }
            }
            _ => {}
        }
    }

    let id = state.next_id.fetch_add(1, Ordering::SeqCst).to_string();
    debug!(project_id = %id, project_name = %name, "Fake project created");

    state.created_names.write().await.push(name.clone());
    state
        .projects
        .write()
        .await
        .insert(id.clone(), FakeProject::from_upload(name, &contents, &separator));

    Redirect::to(&format!("/project?project={}", id)).into_response()
}

pub async fn apply_operations(
    State(state): State<Arc<FakeState>>,
    Query(query): Query<CsrfQuery>,
    Form(form): Form<ApplyForm>,
) -> Response {
    state.delay().await;

    if !state.token_valid(query.csrf_token.as_deref()).await {
        return forbidden();
    }

    let operations: Vec<Value> = match serde_json::from_str(&form.operations) {
        Ok(ops) => ops,
        Err(e) => return code_error(e.to_string()).into_response(),
    };
    if let Err(e) = validate_operations(&operations) {
        return code_error(e).into_response();
    }

    let mut projects = state.projects.write().await;
    let Some(project) = projects.get_mut(&form.project) else {
        return code_error(format!("Failed to find project id #{}", form.project)).into_response();
    };

    if state.config.pending_polls > 0 {
        project.pending = Some(PendingWork {
            remaining: state.config.pending_polls,
            operations,
        });
        return Json(json!({ "code": "pending" })).into_response();
    }

    match project.apply(&operations) {
        Ok(()) => Json(json!({ "code": "ok" })).into_response(),
        Err(e) => code_error(e).into_response(),
    }
}

pub async fn get_processes(
    State(state): State<Arc<FakeState>>,
    Query(query): Query<ProjectQuery>,
) -> impl IntoResponse {
    state.delay().await;

    let mut projects = state.projects.write().await;
    let mut count = 0;

    if let Some(project) = projects.get_mut(&query.project) {
        if let Some(mut pending) = project.pending.take() {
            if pending.remaining == 0 {
                // Deferred work finishes once the count has drained.
                let _ = project.apply(&pending.operations);
            } else {
                count = pending.remaining;
                pending.remaining -= 1;
                project.pending = Some(pending);
            }
        }
    }

    let processes: Vec<Value> = (0..count)
        .map(|i| json!({ "id": i, "status": "running", "description": "Text transform" }))
        .collect();
    Json(json!({ "processes": processes }))
}

pub async fn export_rows(
    State(state): State<Arc<FakeState>>,
    Query(query): Query<CsrfQuery>,
    Form(form): Form<ExportForm>,
) -> Response {
    state.delay().await;

    if !state.token_valid(query.csrf_token.as_deref()).await {
        return forbidden();
    }

    let separator = match form.format.as_str() {
        "csv" => ",",
        "tsv" => "\t",
        _ => return (StatusCode::BAD_REQUEST, String::new()).into_response(),
    };

    let projects = state.projects.read().await;
    match projects.get(&form.project) {
        Some(project) => project.render(separator).into_response(),
        None => (StatusCode::NOT_FOUND, String::new()).into_response(),
    }
}

pub async fn delete_project(
    State(state): State<Arc<FakeState>>,
    Query(query): Query<CsrfQuery>,
    Form(form): Form<ProjectForm>,
) -> Response {
    state.delay().await;

    if !state.token_valid(query.csrf_token.as_deref()).await {
        return forbidden();
    }

    let removed = state.projects.write().await.remove(&form.project);
    match removed {
        Some(_) => {
            state.deleted.write().await.push(form.project);
            Json(json!({ "code": "ok" })).into_response()
        }
        None => code_error(format!("Failed to find project id #{}", form.project)).into_response(),
    }
}
