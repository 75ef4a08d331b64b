//! Request and response types for the studio API.

use serde::{Deserialize, Serialize};

use studio_core::{GeneratedAsset, GenerationJob, GenerationParams};

/// Request body for starting a generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    /// The model to generate with.
    pub model_id: String,
    /// The text prompt.
    pub prompt: String,
    /// Generation parameters.
    #[serde(default)]
    pub params: GenerationParams,
}

/// Response to a generation submission.
#[derive(Debug, Deserialize)]
pub struct GenerationResponse {
    /// The job record; its id is the polling token.
    pub job: GenerationJob,
    /// Queue position at submission time, if the vendor reported one.
    #[serde(default)]
    pub queue_position: Option<u32>,
    /// Persisted outputs, primary first. Empty for queued submissions.
    #[serde(default)]
    pub assets: Vec<GeneratedAsset>,
}

/// Response to a cost estimate.
#[derive(Debug, Deserialize)]
pub struct EstimateResponse {
    /// The model that was priced.
    pub model_id: String,
    /// Tickets the generation would cost.
    pub ticket_cost: i64,
}

/// A job with its persisted assets.
#[derive(Debug, Deserialize)]
pub struct JobStatusResponse {
    /// The job record.
    pub job: GenerationJob,
    /// Assets, non-empty only for completed jobs.
    #[serde(default)]
    pub assets: Vec<GeneratedAsset>,
}

/// A listing of jobs.
#[derive(Debug, Deserialize)]
pub struct JobListResponse {
    /// The matching jobs.
    pub jobs: Vec<GenerationJob>,
}

/// Error response envelope returned by the service.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}
