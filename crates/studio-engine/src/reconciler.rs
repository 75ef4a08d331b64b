//! Timer-driven settlement of asynchronous jobs.
//!
//! Every tick, the reconciler sweeps all non-terminal jobs: it polls
//! outstanding provider handles, settles completions and failures through
//! the orchestrator's guarded paths, and force-fails anything past the
//! timeout ceiling. Because the ceiling is measured from `started_at`,
//! the same sweep also cleans up jobs orphaned by a crash.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use studio_core::GenerationJob;
use studio_providers::{PollState, ProviderError};

use crate::orchestrator::Orchestrator;

/// The polling loop resolving asynchronous jobs to terminal states.
pub struct Reconciler {
    orchestrator: Arc<Orchestrator>,
    interval: std::time::Duration,
}

impl Reconciler {
    /// Create a reconciler sweeping every `interval`.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>, interval: std::time::Duration) -> Self {
        Self {
            orchestrator,
            interval,
        }
    }

    /// Run the sweep loop forever. Spawn this as a background task.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "reconciler started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// One sweep over all non-terminal jobs. Public so tests can drive
    /// the loop deterministically.
    pub async fn tick(&self) {
        let jobs = match self.orchestrator.jobs.list_all_active().await {
            Ok(jobs) => jobs,
            Err(err) => {
                warn!(error = %err, "reconciler could not list active jobs");
                return;
            }
        };

        for job in jobs {
            self.reconcile(job).await;
        }
    }

    async fn reconcile(&self, job: GenerationJob) {
        if Utc::now() - job.started_at > self.orchestrator.job_timeout {
            warn!(job_id = %job.id, "job exceeded timeout ceiling; force-failing");
            self.orchestrator
                .settle_failure(&job, true, "generation timed out")
                .await;
            return;
        }

        // A processing job with no handle is a sync submission orphaned
        // by a crash; only the ceiling above can resolve it.
        let Some(handle) = job.provider_handle.clone() else {
            return;
        };

        let Some(adapter) = self.orchestrator.registry.adapter_for(&job.model_id) else {
            warn!(job_id = %job.id, model_id = %job.model_id, "no adapter for outstanding job");
            return;
        };

        match adapter.poll(&handle).await {
            Ok(outcome) => match outcome.state {
                PollState::Completed => {
                    if let Err(err) = self
                        .orchestrator
                        .settle_success(&job, true, &outcome.urls)
                        .await
                    {
                        error!(job_id = %job.id, error = %err, "settlement failed");
                    }
                }
                PollState::Failed => {
                    self.orchestrator
                        .settle_failure(
                            &job,
                            true,
                            outcome.error.as_deref().unwrap_or("generation failed"),
                        )
                        .await;
                }
                PollState::Queued | PollState::Processing => {
                    debug!(
                        job_id = %job.id,
                        state = ?outcome.state,
                        queue_position = outcome.queue_position,
                        "job still in flight"
                    );
                }
            },
            // Transient poll failures are retried on the next tick; the
            // timeout ceiling bounds how long that can go on.
            Err(ProviderError::Timeout | ProviderError::Unavailable(_)) => {
                debug!(job_id = %job.id, "poll attempt failed; will retry");
            }
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "poll returned an unexpected error");
            }
        }
    }
}
