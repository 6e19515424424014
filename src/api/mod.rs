//! HTTP surface for submitting, inspecting and cancelling jobs.

pub mod error;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::scheduler::{CancelOutcome, Job, JobManager};
use crate::store::JobStore;

pub use error::ApiError;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn JobStore>,
    pub manager: Arc<JobManager>,
    /// Providers jobs may be submitted for. Empty accepts any provider.
    pub providers: Arc<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitJobsRequest {
    pub provider: String,
    pub payloads: Vec<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    queued: usize,
    running: usize,
    max_queue_size: usize,
    max_concurrent_jobs: usize,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    name: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct CancelResponse {
    outcome: &'static str,
    job: Job,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/providers", get(providers_handler))
        .route("/jobs", get(list_jobs_handler).post(submit_jobs_handler))
        .route("/jobs/running", get(running_jobs_handler))
        .route("/jobs/queued", get(queued_jobs_handler))
        .route("/jobs/{id}", get(get_job_handler))
        .route("/jobs/{id}/cancel", post(cancel_job_handler))
        .layer(cors)
        .with_state(state)
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("invalid job id: {}", raw)))
}

async fn health_handler(State(state): State<ApiState>) -> Json<HealthResponse> {
    let stats = state.manager.stats().await;
    Json(HealthResponse {
        status: "ok",
        queued: stats.queued,
        running: stats.running,
        max_queue_size: stats.max_queue_size,
        max_concurrent_jobs: stats.max_concurrent_jobs,
    })
}

async fn version_handler() -> Json<VersionResponse> {
    Json(VersionResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn providers_handler(State(state): State<ApiState>) -> Json<Vec<String>> {
    Json(state.providers.as_ref().clone())
}

async fn list_jobs_handler(State(state): State<ApiState>) -> Result<Json<Vec<Job>>, ApiError> {
    Ok(Json(state.store.list_all().await?))
}

async fn submit_jobs_handler(
    State(state): State<ApiState>,
    Json(request): Json<SubmitJobsRequest>,
) -> Result<Json<Vec<Job>>, ApiError> {
    let provider = request.provider.trim();
    if provider.is_empty() {
        return Err(ApiError::BadRequest("provider is required".to_string()));
    }
    if request.payloads.is_empty() {
        return Err(ApiError::BadRequest(
            "at least one payload is required".to_string(),
        ));
    }
    if !state.providers.is_empty() && !state.providers.iter().any(|p| p == provider) {
        return Err(ApiError::BadRequest(format!(
            "unknown provider: {}",
            provider
        )));
    }

    let mut created = Vec::with_capacity(request.payloads.len());
    for payload in request.payloads {
        created.push(state.store.create(Job::new(provider, payload)).await?);
    }
    tracing::info!(provider, count = created.len(), "Jobs submitted");
    Ok(Json(created))
}

async fn get_job_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let id = parse_id(&id)?;
    state
        .store
        .get_by_uuid(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", id)))
}

async fn running_jobs_handler(State(state): State<ApiState>) -> Json<Vec<Job>> {
    Json(state.manager.running_jobs().await)
}

async fn queued_jobs_handler(State(state): State<ApiState>) -> Json<Vec<Job>> {
    Json(state.manager.queued_jobs().await)
}

async fn cancel_job_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let id = parse_id(&id)?;
    let cancellation = state.manager.cancel(&id).await?;
    let outcome = match cancellation.outcome {
        CancelOutcome::Dequeued => "dequeued",
        CancelOutcome::Stopped => "stopped",
        CancelOutcome::NotTracked => "not_tracked",
    };
    Ok(Json(CancelResponse {
        outcome,
        job: cancellation.job,
    }))
}
