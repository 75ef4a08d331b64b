//! Generation job types.
//!
//! A `GenerationJob` tracks one attempted generation end-to-end: it is
//! created at submission time, moves through at most one queued/processing
//! phase, and transitions exactly once to a terminal state. Job rows are
//! never deleted by normal operation; they are the audit trail and the
//! reconciler's source of truth after reloads and crashes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::params::GenerationParams;
use crate::{JobId, UserId};

/// Maximum stored length of a job error message, in characters.
///
/// Provider error payloads can be arbitrarily large; everything beyond
/// this bound is cut before the failure is persisted.
pub const ERROR_MESSAGE_MAX_CHARS: usize = 500;

/// Truncate an error message to [`ERROR_MESSAGE_MAX_CHARS`] for storage.
#[must_use]
pub fn truncate_error(message: &str) -> String {
    message.chars().take(ERROR_MESSAGE_MAX_CHARS).collect()
}

/// Whether a model produces images or video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Still image output.
    Image,
    /// Video clip output.
    Video,
}

impl ModelType {
    /// Get the model type as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

/// Lifecycle state of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted by an asynchronous provider, waiting in its queue.
    Queued,
    /// Being generated (synchronous call in flight, or provider running).
    Processing,
    /// Terminal success; `result_url` is set.
    Completed,
    /// Terminal failure; `error_message` is set.
    Failed,
}

impl JobStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Get the status as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            other => Err(format!("unknown model type: {other}")),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// One attempted generation, tracked from submission to terminal outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Job id; also the externally visible correlation token.
    pub id: JobId,

    /// The owning user.
    pub user_id: UserId,

    /// The model the job was submitted to.
    pub model_id: String,

    /// Image or video.
    pub model_type: ModelType,

    /// The text prompt.
    pub prompt: String,

    /// Normalized parameters, frozen at submission time.
    pub params: GenerationParams,

    /// Current lifecycle state.
    pub status: JobStatus,

    /// Ticket cost snapshot taken at reservation time.
    ///
    /// Never recomputed, even if the pricing table changes mid-flight.
    pub ticket_cost: i64,

    /// Provider-side correlation id for asynchronous jobs.
    pub provider_handle: Option<String>,

    /// Settlement guard: set exactly once, before commit or release runs.
    pub settled: bool,

    /// Durable URL of the primary asset, set on completion.
    pub result_url: Option<String>,

    /// Failure description, truncated for storage, set on failure.
    pub error_message: Option<String>,

    /// When the job was submitted.
    pub started_at: DateTime<Utc>,

    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl GenerationJob {
    /// Create a new job in the `Processing` state with the clock started.
    #[must_use]
    pub fn new(
        user_id: UserId,
        model_id: impl Into<String>,
        model_type: ModelType,
        prompt: impl Into<String>,
        params: GenerationParams,
        ticket_cost: i64,
    ) -> Self {
        Self {
            id: JobId::generate(),
            user_id,
            model_id: model_id.into(),
            model_type,
            prompt: prompt.into(),
            params,
            status: JobStatus::Processing,
            ticket_cost,
            provider_handle: None,
            settled: false,
            result_url: None,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Whether the job has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_starts_processing_and_unsettled() {
        let job = GenerationJob::new(
            UserId::generate(),
            "lumina-image-1",
            ModelType::Image,
            "a quiet harbor at dawn",
            GenerationParams::default(),
            2,
        );

        assert_eq!(job.status, JobStatus::Processing);
        assert!(!job.settled);
        assert!(!job.is_terminal());
        assert!(job.result_url.is_none());
        assert!(job.completed_at.is_none());
        assert_eq!(job.ticket_cost, 2);
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn error_messages_are_truncated() {
        let long = "x".repeat(ERROR_MESSAGE_MAX_CHARS * 3);
        let stored = truncate_error(&long);
        assert_eq!(stored.chars().count(), ERROR_MESSAGE_MAX_CHARS);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(ERROR_MESSAGE_MAX_CHARS + 10);
        let stored = truncate_error(&long);
        assert_eq!(stored.chars().count(), ERROR_MESSAGE_MAX_CHARS);
    }

    #[test]
    fn short_error_kept_verbatim() {
        assert_eq!(truncate_error("safety filter"), "safety filter");
    }
}
