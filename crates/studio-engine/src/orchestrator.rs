//! The generation orchestrator.
//!
//! Drives one generation through pricing, reservation, provider submission
//! and settlement. The invariant everything here serves: every successful
//! reservation is committed or released exactly once, and the release path
//! is never provider-aware.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use studio_core::{
    truncate_error, BalanceSnapshot, GeneratedAsset, GenerationJob, GenerationParams,
    GenerationRequest, JobId, JobStatus, PricingTable, Result, StudioError, UserId,
};
use studio_providers::{PollState, ProviderAdapter, ProviderError, ProviderRegistry, Submission};
use studio_store::{AssetStore, JobStore, LedgerStore, StoreError};

use crate::assets::AssetSink;

/// Tunables for the orchestrator and its polling fallback.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Maximum non-terminal jobs per user.
    pub max_inflight: usize,
    /// Poll interval for asynchronous jobs.
    pub poll_interval: Duration,
    /// Ceiling after which a non-terminal job is force-failed, measured
    /// from `started_at`.
    pub job_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_inflight: 4,
            poll_interval: Duration::from_secs(3),
            job_timeout: Duration::from_secs(300),
        }
    }
}

/// What `start_generation` hands back to the caller.
#[derive(Debug)]
pub enum GenerationOutcome {
    /// A synchronous provider finished within the request; tickets are
    /// committed and the assets are durable.
    Completed {
        /// The terminal job record.
        job: GenerationJob,
        /// The persisted outputs, primary first.
        assets: Vec<GeneratedAsset>,
    },
    /// An asynchronous provider accepted the job; tickets stay reserved
    /// until the reconciler settles it.
    Pending {
        /// The queued job record; its id is the correlation token.
        job: GenerationJob,
        /// Queue position at submission time, if reported.
        queue_position: Option<u32>,
    },
}

/// A job together with its persisted outputs.
#[derive(Debug)]
pub struct JobView {
    /// The job record.
    pub job: GenerationJob,
    /// Assets, non-empty only for completed jobs.
    pub assets: Vec<GeneratedAsset>,
}

/// The reserve → submit → settle core.
pub struct Orchestrator {
    pub(crate) ledgers: Arc<dyn LedgerStore>,
    pub(crate) jobs: Arc<dyn JobStore>,
    pub(crate) assets: Arc<dyn AssetStore>,
    pub(crate) registry: Arc<ProviderRegistry>,
    sink: Arc<dyn AssetSink>,
    pricing: PricingTable,
    max_inflight: usize,
    poll_interval: Duration,
    pub(crate) job_timeout: chrono::Duration,
    /// Settlement guard for jobs whose record insert failed; the job
    /// store's `settled` flag cannot protect what it never stored.
    untracked_guard: Mutex<HashSet<JobId>>,
}

fn store_error(err: StoreError) -> StudioError {
    match err {
        StoreError::InsufficientTickets {
            available,
            required,
        } => StudioError::InsufficientTickets {
            available,
            required,
        },
        StoreError::NotFound {
            entity: "ledger",
            id,
        } => StudioError::NoLedger { user_id: id },
        other => StudioError::Storage(other.to_string()),
    }
}

fn provider_error(err: ProviderError) -> StudioError {
    match err {
        ProviderError::ContentPolicy(m) | ProviderError::InvalidParameters(m) => {
            StudioError::ProviderRejected(m)
        }
        ProviderError::Timeout => StudioError::ProviderTimeout,
        ProviderError::Unavailable(m) => StudioError::ProviderUnavailable(m),
        ProviderError::Malformed(m) => {
            StudioError::ProviderUnavailable(format!("malformed response: {m}"))
        }
        ProviderError::PollUnsupported(id) => {
            StudioError::ProviderUnavailable(format!("adapter {id} cannot poll"))
        }
    }
}

impl Orchestrator {
    /// Build an orchestrator over the given stores, registry and sink.
    #[must_use]
    pub fn new(
        ledgers: Arc<dyn LedgerStore>,
        jobs: Arc<dyn JobStore>,
        assets: Arc<dyn AssetStore>,
        registry: Arc<ProviderRegistry>,
        sink: Arc<dyn AssetSink>,
        pricing: PricingTable,
        settings: EngineSettings,
    ) -> Self {
        let timeout_secs = i64::try_from(settings.job_timeout.as_secs()).unwrap_or(i64::MAX);
        Self {
            ledgers,
            jobs,
            assets,
            registry,
            sink,
            pricing,
            max_inflight: settings.max_inflight,
            poll_interval: settings.poll_interval,
            job_timeout: chrono::Duration::seconds(timeout_secs),
            untracked_guard: Mutex::new(HashSet::new()),
        }
    }

    /// Price a generation without starting it.
    ///
    /// # Errors
    ///
    /// `UnknownModel` or `InvalidParameters`, exactly as
    /// [`PricingTable::ticket_cost`].
    pub fn estimate_cost(&self, model_id: &str, params: &GenerationParams) -> Result<i64> {
        self.pricing.ticket_cost(model_id, params)
    }

    /// Current balance figures for a user.
    ///
    /// # Errors
    ///
    /// `NoLedger` when the user was never provisioned.
    pub async fn get_balance(&self, user_id: &UserId) -> Result<BalanceSnapshot> {
        self.ledgers
            .get_ledger(user_id)
            .await
            .map_err(store_error)?
            .map(|ledger| ledger.snapshot())
            .ok_or_else(|| StudioError::NoLedger {
                user_id: user_id.to_string(),
            })
    }

    /// Run one generation end to end.
    ///
    /// Synchronous providers settle inline and return
    /// [`GenerationOutcome::Completed`]; asynchronous providers return
    /// [`GenerationOutcome::Pending`] immediately and the reconciler
    /// settles later. On any failure after the reservation, the
    /// reservation is released before the error is returned.
    ///
    /// # Errors
    ///
    /// The full taxonomy: `UnknownModel` / `InvalidParameters` (pricing),
    /// `TooManyInFlight`, `NoLedger` / `InsufficientTickets` (reservation),
    /// `ProviderRejected` / `ProviderUnavailable` / `ProviderTimeout`
    /// (submission, refunded), `PersistenceFailure` (settling, refunded).
    pub async fn start_generation(
        self: &Arc<Self>,
        user_id: UserId,
        model_id: &str,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<GenerationOutcome> {
        let cost = self.pricing.ticket_cost(model_id, &params)?;
        let model_type = self
            .pricing
            .model_type(model_id)
            .ok_or_else(|| StudioError::UnknownModel {
                model_id: model_id.to_string(),
            })?;
        let adapter = self.registry.adapter_for(model_id).ok_or_else(|| {
            StudioError::ProviderUnavailable(format!("no adapter configured for {model_id}"))
        })?;

        let active = self
            .jobs
            .count_active(&user_id)
            .await
            .map_err(store_error)?;
        if active >= self.max_inflight {
            return Err(StudioError::TooManyInFlight {
                limit: self.max_inflight,
            });
        }

        // No provider call happens unless this succeeds.
        self.ledgers
            .reserve(&user_id, cost)
            .await
            .map_err(store_error)?;
        info!(user_id = %user_id, model_id, cost, "tickets reserved");

        let mut job = GenerationJob::new(user_id, model_id, model_type, prompt, params.clone(), cost);
        let tracked = match self.jobs.create(&job).await {
            Ok(()) => true,
            Err(err) => {
                // Tracking is observability, not a gate.
                warn!(job_id = %job.id, error = %err, "job record insert failed; generation proceeds untracked");
                false
            }
        };

        let request = GenerationRequest {
            model_id: model_id.to_string(),
            model_type,
            prompt: prompt.to_string(),
            params,
        };

        match adapter.submit(&request).await {
            Err(err) => {
                let mapped = provider_error(err);
                self.settle_failure(&job, tracked, &mapped.to_string()).await;
                Err(mapped)
            }
            Ok(Submission::Completed(result)) => {
                match self.settle_success(&job, tracked, &result.urls).await? {
                    Some(assets) => {
                        job.status = JobStatus::Completed;
                        job.result_url = assets.first().map(|a| a.url.clone());
                        job.completed_at = Some(Utc::now());
                        Ok(GenerationOutcome::Completed { job, assets })
                    }
                    // Guard lost: the timeout sweep settled this job first
                    // and released the hold. Report the stored state, not a
                    // completion that never charged.
                    None => match self.jobs.get_job(&job.id).await.map_err(store_error)? {
                        Some(stored) if stored.status == JobStatus::Completed => {
                            let assets = self
                                .assets
                                .list_for_job(&stored.id)
                                .await
                                .map_err(store_error)?;
                            Ok(GenerationOutcome::Completed {
                                job: stored,
                                assets,
                            })
                        }
                        _ => Err(StudioError::ProviderTimeout),
                    },
                }
            }
            Ok(Submission::Pending(handle)) => {
                job.provider_handle = Some(handle.handle.clone());
                job.status = JobStatus::Queued;

                let recorded = if tracked {
                    match self.jobs.mark_queued(&job.id, &handle.handle).await {
                        Ok(()) => true,
                        Err(err) => {
                            warn!(job_id = %job.id, error = %err, "failed to record provider handle");
                            false
                        }
                    }
                } else {
                    false
                };

                if !recorded {
                    // The reconciler can only see handles the job store
                    // holds; poll this one from here instead.
                    self.spawn_local_poll(job.clone(), adapter);
                }

                Ok(GenerationOutcome::Pending {
                    job,
                    queue_position: handle.queue_position,
                })
            }
        }
    }

    /// Fetch one of the user's jobs with its assets.
    ///
    /// # Errors
    ///
    /// `JobNotFound` for missing ids and for jobs owned by someone else.
    pub async fn get_job_status(&self, user_id: &UserId, job_id: &JobId) -> Result<JobView> {
        let job = self
            .jobs
            .get_job(job_id)
            .await
            .map_err(store_error)?
            .filter(|j| j.user_id == *user_id)
            .ok_or_else(|| StudioError::JobNotFound {
                job_id: job_id.to_string(),
            })?;

        let assets = if job.status == JobStatus::Completed {
            self.assets.list_for_job(job_id).await.map_err(store_error)?
        } else {
            Vec::new()
        };

        Ok(JobView { job, assets })
    }

    /// The user's non-terminal jobs, oldest first (reload recovery).
    ///
    /// # Errors
    ///
    /// Returns `Storage` on store failure.
    pub async fn list_active_jobs(&self, user_id: &UserId) -> Result<Vec<GenerationJob>> {
        self.jobs.list_active(user_id).await.map_err(store_error)
    }

    /// The user's terminal jobs since `since`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on store failure.
    pub async fn list_recent_jobs(
        &self,
        user_id: &UserId,
        since: chrono::DateTime<Utc>,
    ) -> Result<Vec<GenerationJob>> {
        self.jobs
            .list_recent(user_id, since)
            .await
            .map_err(store_error)
    }

    // ===== Settlement =====

    /// Claim the right to settle this job. Exactly one caller wins.
    async fn acquire_settlement(&self, job_id: &JobId, tracked: bool) -> bool {
        if tracked {
            match self.jobs.try_settle(job_id).await {
                Ok(won) => return won,
                Err(err) => {
                    warn!(job_id = %job_id, error = %err, "settlement guard unavailable in job store; using in-process guard");
                }
            }
        }
        self.untracked_guard.lock().await.insert(*job_id)
    }

    async fn release_reservation(&self, job: &GenerationJob) {
        if let Err(err) = self.ledgers.release(&job.user_id, job.ticket_cost).await {
            error!(
                job_id = %job.id, user_id = %job.user_id, error = %err,
                "reservation release failed; tickets may be stranded"
            );
        }
    }

    async fn fail_persistence(
        &self,
        job: &GenerationJob,
        tracked: bool,
        detail: &str,
    ) -> StudioError {
        // The provider did generate; real external cost was incurred with
        // no user charge. Charging for an asset the user never received
        // would be worse.
        error!(
            job_id = %job.id, user_id = %job.user_id, error = %detail,
            "asset persistence failed after successful generation; releasing reservation"
        );
        self.release_reservation(job).await;
        if tracked {
            if let Err(err) = self.jobs.mark_failed(&job.id, &truncate_error(detail)).await {
                warn!(job_id = %job.id, error = %err, "failed to record persistence failure");
            }
        }
        StudioError::PersistenceFailure(detail.to_string())
    }

    /// Settle a finished generation: persist outputs, commit tickets,
    /// mark the job completed. Returns `Ok(None)` if another settlement
    /// already won the guard.
    pub(crate) async fn settle_success(
        &self,
        job: &GenerationJob,
        tracked: bool,
        source_urls: &[String],
    ) -> Result<Option<Vec<GeneratedAsset>>> {
        if !self.acquire_settlement(&job.id, tracked).await {
            debug!(job_id = %job.id, "settlement already handled");
            return Ok(None);
        }

        let mut durable = Vec::with_capacity(source_urls.len());
        for (index, source) in source_urls.iter().enumerate() {
            match self.sink.persist(&job.id, index, source).await {
                Ok(url) => durable.push(url),
                Err(err) => {
                    return Err(self.fail_persistence(job, tracked, &err.to_string()).await)
                }
            }
        }

        let mut rows = Vec::with_capacity(durable.len());
        for (index, url) in durable.into_iter().enumerate() {
            let asset = GeneratedAsset::from_job(job, url, index == 0);
            if let Err(err) = self.assets.put(&asset).await {
                return Err(self.fail_persistence(job, tracked, &err.to_string()).await);
            }
            rows.push(asset);
        }

        if let Err(err) = self.ledgers.commit(&job.user_id, job.ticket_cost).await {
            error!(
                job_id = %job.id, user_id = %job.user_id, error = %err,
                "ledger commit failed after assets were persisted"
            );
            return Err(store_error(err));
        }

        if tracked {
            let primary = rows.first().map_or("", |a| a.url.as_str());
            if let Err(err) = self.jobs.mark_completed(&job.id, primary).await {
                warn!(job_id = %job.id, error = %err, "failed to record completion");
            }
        }

        info!(
            job_id = %job.id, user_id = %job.user_id,
            cost = job.ticket_cost, assets = rows.len(),
            "generation settled"
        );
        Ok(Some(rows))
    }

    /// Settle a failed generation: release the reservation and record the
    /// failure. No-op if another settlement already won the guard.
    pub(crate) async fn settle_failure(&self, job: &GenerationJob, tracked: bool, message: &str) {
        if !self.acquire_settlement(&job.id, tracked).await {
            debug!(job_id = %job.id, "settlement already handled");
            return;
        }

        self.release_reservation(job).await;
        if tracked {
            if let Err(err) = self.jobs.mark_failed(&job.id, &truncate_error(message)).await {
                warn!(job_id = %job.id, error = %err, "failed to record failure");
            }
        }
        info!(
            job_id = %job.id, user_id = %job.user_id,
            cost = job.ticket_cost, reason = message,
            "reservation released"
        );
    }

    /// Poll an asynchronous job the job store never recorded.
    fn spawn_local_poll(self: &Arc<Self>, job: GenerationJob, adapter: Arc<dyn ProviderAdapter>) {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let Some(handle) = job.provider_handle.clone() else {
                return;
            };
            let mut interval = tokio::time::interval(orchestrator.poll_interval);
            loop {
                interval.tick().await;

                if Utc::now() - job.started_at > orchestrator.job_timeout {
                    orchestrator
                        .settle_failure(&job, false, "generation timed out")
                        .await;
                    return;
                }

                match adapter.poll(&handle).await {
                    Ok(outcome) => match outcome.state {
                        PollState::Completed => {
                            if let Err(err) = orchestrator
                                .settle_success(&job, false, &outcome.urls)
                                .await
                            {
                                error!(job_id = %job.id, error = %err, "untracked settlement failed");
                            }
                            return;
                        }
                        PollState::Failed => {
                            orchestrator
                                .settle_failure(
                                    &job,
                                    false,
                                    outcome.error.as_deref().unwrap_or("generation failed"),
                                )
                                .await;
                            return;
                        }
                        PollState::Queued | PollState::Processing => {}
                    },
                    Err(err) => {
                        debug!(job_id = %job.id, error = %err, "poll attempt failed");
                    }
                }
            }
        });
    }
}
