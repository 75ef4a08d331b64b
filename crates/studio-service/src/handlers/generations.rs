//! Generation handlers: submission, estimates, status, listings.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use studio_core::{GeneratedAsset, GenerationJob, GenerationParams, JobId};
use studio_engine::GenerationOutcome;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// How far back `/generations/recent` looks when `since` is omitted.
const DEFAULT_RECENT_WINDOW_HOURS: i64 = 24;

/// Generation request.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// The model to generate with.
    pub model_id: String,
    /// The text prompt.
    pub prompt: String,
    /// Generation parameters (all optional, with defaults).
    #[serde(default)]
    pub params: GenerationParams,
}

/// Generation response.
///
/// Synchronous completions carry their assets inline; queued submissions
/// carry the queue position and an empty asset list.
#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    /// The job record; its id is the polling token.
    pub job: GenerationJob,
    /// Queue position at submission time, if the vendor reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u32>,
    /// Persisted outputs, primary first.
    pub assets: Vec<GeneratedAsset>,
}

/// Start a generation.
///
/// The orchestration runs on its own task: once the reservation is taken,
/// a client disconnect or gateway timeout cancels only the wait for the
/// result, never the reserve-settle sequence itself. A caller whose
/// request was cut off reattaches through `/generations/active` or
/// `/generations/recent`.
pub async fn start_generation(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let orchestrator = Arc::clone(&state.orchestrator);
    let outcome = tokio::spawn(async move {
        orchestrator
            .start_generation(auth.user_id, &body.model_id, &body.prompt, body.params)
            .await
    })
    .await
    .map_err(|err| ApiError::Internal(format!("generation task failed: {err}")))??;

    let response = match outcome {
        GenerationOutcome::Completed { job, assets } => GenerationResponse {
            job,
            queue_position: None,
            assets,
        },
        GenerationOutcome::Pending {
            job,
            queue_position,
        } => GenerationResponse {
            job,
            queue_position,
            assets: Vec::new(),
        },
    };

    Ok(Json(response))
}

/// Estimate request.
#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    /// The model to price.
    pub model_id: String,
    /// Generation parameters the price depends on.
    #[serde(default)]
    pub params: GenerationParams,
}

/// Estimate response.
#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    /// The model that was priced.
    pub model_id: String,
    /// Tickets the generation would cost.
    pub ticket_cost: i64,
}

/// Price a generation without starting it.
pub async fn estimate_cost(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Json(body): Json<EstimateRequest>,
) -> Result<Json<EstimateResponse>, ApiError> {
    let ticket_cost = state
        .orchestrator
        .estimate_cost(&body.model_id, &body.params)?;

    Ok(Json(EstimateResponse {
        model_id: body.model_id,
        ticket_cost,
    }))
}

/// Job status response.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    /// The job record.
    pub job: GenerationJob,
    /// Assets, non-empty only for completed jobs.
    pub assets: Vec<GeneratedAsset>,
}

/// Fetch one of the user's jobs with its assets.
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job_id = id
        .parse::<JobId>()
        .map_err(|_| ApiError::BadRequest(format!("invalid job id: {id}")))?;

    let view = state.orchestrator.get_job_status(&auth.user_id, &job_id).await?;

    Ok(Json(JobStatusResponse {
        job: view.job,
        assets: view.assets,
    }))
}

/// Job listing response.
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    /// The matching jobs.
    pub jobs: Vec<GenerationJob>,
}

/// List the user's non-terminal jobs, oldest first.
///
/// Clients call this after a reload to reattach to in-flight work.
pub async fn list_active(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<JobListResponse>, ApiError> {
    let jobs = state.orchestrator.list_active_jobs(&auth.user_id).await?;

    Ok(Json(JobListResponse { jobs }))
}

/// Query parameters for the recent-jobs listing.
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    /// Only jobs that terminated at or after this instant (RFC 3339).
    pub since: Option<DateTime<Utc>>,
}

/// List the user's terminal jobs, newest first.
///
/// Surfaces jobs that finished while the client was disconnected.
pub async fn list_recent(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<RecentQuery>,
) -> Result<Json<JobListResponse>, ApiError> {
    let since = query
        .since
        .unwrap_or_else(|| Utc::now() - Duration::hours(DEFAULT_RECENT_WINDOW_HOURS));

    let jobs = state
        .orchestrator
        .list_recent_jobs(&auth.user_id, since)
        .await?;

    Ok(Json(JobListResponse { jobs }))
}
