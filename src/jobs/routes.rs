//! REST endpoints for the job store.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::{debug, error};

use super::model::{JobStatus, NewJob};
use super::store::JobStore;
use crate::error::JobError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<JobStore>,
}

/// Build the Axum router for the job API.
pub fn job_routes(store: Arc<JobStore>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/search", get(search_jobs))
        .route("/jobs/{id}", get(get_job))
        .with_state(AppState { store })
}

impl IntoResponse for JobError {
    fn into_response(self) -> Response {
        let status = match &self {
            JobError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            JobError::NotFound { .. } => StatusCode::NOT_FOUND,
            JobError::Storage(e) => {
                error!(error = %e, "Job storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "job-tracker"
    }))
}

// ── Jobs ────────────────────────────────────────────────────────────────

async fn create_job(
    State(state): State<AppState>,
    Json(body): Json<NewJob>,
) -> Result<impl IntoResponse, JobError> {
    let job = state.store.create(body).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.find_all().await)
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    title: Option<String>,
    status: Option<String>,
}

async fn search_jobs(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, JobError> {
    // Blank query parameters count as absent.
    let title = query.title.as_deref().filter(|t| !t.is_empty());
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(s.parse::<JobStatus>()?),
        None => None,
    };

    debug!(?title, ?status, "Searching jobs");
    Ok(Json(state.store.search(title, status).await))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, JobError> {
    let job = state.store.find_one(&id).await?;
    Ok(Json(job))
}
