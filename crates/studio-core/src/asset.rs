//! Generated asset types.
//!
//! A `GeneratedAsset` is one persisted output copied from provider-ephemeral
//! storage into durable storage. A single job can yield several assets (some
//! image models return up to 4 per call).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::job::GenerationJob;
use crate::{AssetId, JobId, UserId};

/// Retention window for generated assets, in days.
pub const ASSET_RETENTION_DAYS: i64 = 30;

/// One durable generation output owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedAsset {
    /// Asset id (ULID, time-ordered).
    pub id: AssetId,

    /// The owning user.
    pub user_id: UserId,

    /// The job that produced this asset.
    pub job_id: JobId,

    /// The model that generated it.
    pub model_id: String,

    /// The source prompt.
    pub prompt: String,

    /// Durable storage URL.
    pub url: String,

    /// Ticket cost attributed to this asset.
    ///
    /// Only the first asset of a multi-asset job carries the job's cost;
    /// siblings carry zero so the job is never double counted.
    pub ticket_cost: i64,

    /// When the asset was persisted.
    pub created_at: DateTime<Utc>,

    /// When the asset leaves the retention window.
    pub expires_at: DateTime<Utc>,
}

impl GeneratedAsset {
    /// Create an asset row for one output of a job.
    ///
    /// `carries_cost` is true for the first output only.
    #[must_use]
    pub fn from_job(job: &GenerationJob, url: impl Into<String>, carries_cost: bool) -> Self {
        let now = Utc::now();
        Self {
            id: AssetId::generate(),
            user_id: job.user_id,
            job_id: job.id,
            model_id: job.model_id.clone(),
            prompt: job.prompt.clone(),
            url: url.into(),
            ticket_cost: if carries_cost { job.ticket_cost } else { 0 },
            created_at: now,
            expires_at: now + Duration::days(ASSET_RETENTION_DAYS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GenerationParams;
    use crate::ModelType;

    fn job() -> GenerationJob {
        GenerationJob::new(
            UserId::generate(),
            "lumina-image-1",
            ModelType::Image,
            "poster concept",
            GenerationParams::default(),
            3,
        )
    }

    #[test]
    fn first_asset_carries_full_cost() {
        let job = job();
        let first = GeneratedAsset::from_job(&job, "https://cdn.example/a.png", true);
        let sibling = GeneratedAsset::from_job(&job, "https://cdn.example/b.png", false);

        assert_eq!(first.ticket_cost, 3);
        assert_eq!(sibling.ticket_cost, 0);
        assert_eq!(first.job_id, job.id);
    }

    #[test]
    fn retention_window_is_stamped() {
        let asset = GeneratedAsset::from_job(&job(), "https://cdn.example/a.png", true);
        let window = asset.expires_at - asset.created_at;
        assert_eq!(window.num_days(), ASSET_RETENTION_DAYS);
    }
}
