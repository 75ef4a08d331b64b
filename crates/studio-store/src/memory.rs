//! In-memory storage backend.
//!
//! Backs tests and local development. Each ledger mutation runs under a
//! single write lock, which gives it the same atomicity contract as the
//! PostgreSQL backend's conditional single-statement updates.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use studio_core::{
    BalanceSnapshot, GeneratedAsset, GenerationJob, JobId, JobStatus, TicketLedger, UserId,
};

use crate::error::{Result, StoreError};
use crate::{AssetStore, JobStore, LedgerStore};

/// In-memory implementation of all storage traits.
#[derive(Default)]
pub struct MemoryStore {
    ledgers: RwLock<HashMap<UserId, TicketLedger>>,
    jobs: RwLock<HashMap<JobId, GenerationJob>>,
    assets: RwLock<Vec<GeneratedAsset>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn ensure_positive(amount: i64) -> Result<()> {
    if amount > 0 {
        Ok(())
    } else {
        Err(StoreError::InvalidAmount(amount))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn provision(&self, user_id: UserId) -> Result<TicketLedger> {
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers
            .entry(user_id)
            .or_insert_with(|| TicketLedger::new(user_id));
        Ok(ledger.clone())
    }

    async fn get_ledger(&self, user_id: &UserId) -> Result<Option<TicketLedger>> {
        Ok(self.ledgers.read().await.get(user_id).cloned())
    }

    async fn grant(&self, user_id: &UserId, amount: i64) -> Result<BalanceSnapshot> {
        ensure_positive(amount)?;
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers
            .entry(*user_id)
            .or_insert_with(|| TicketLedger::new(*user_id));
        ledger.balance += amount;
        ledger.updated_at = Utc::now();
        Ok(ledger.snapshot())
    }

    async fn reserve(&self, user_id: &UserId, amount: i64) -> Result<BalanceSnapshot> {
        ensure_positive(amount)?;
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers.get_mut(user_id).ok_or(StoreError::NotFound {
            entity: "ledger",
            id: user_id.to_string(),
        })?;

        if ledger.available() < amount {
            return Err(StoreError::InsufficientTickets {
                available: ledger.available(),
                required: amount,
            });
        }

        ledger.reserved += amount;
        ledger.updated_at = Utc::now();
        Ok(ledger.snapshot())
    }

    async fn commit(&self, user_id: &UserId, amount: i64) -> Result<()> {
        ensure_positive(amount)?;
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers.get_mut(user_id).ok_or(StoreError::NotFound {
            entity: "ledger",
            id: user_id.to_string(),
        })?;

        if ledger.reserved < amount {
            return Err(StoreError::ReservationUnderflow {
                reserved: ledger.reserved,
                requested: amount,
            });
        }

        ledger.balance -= amount;
        ledger.reserved -= amount;
        ledger.total_used += amount;
        ledger.updated_at = Utc::now();
        Ok(())
    }

    async fn release(&self, user_id: &UserId, amount: i64) -> Result<()> {
        ensure_positive(amount)?;
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers.get_mut(user_id).ok_or(StoreError::NotFound {
            entity: "ledger",
            id: user_id.to_string(),
        })?;

        if ledger.reserved < amount {
            return Err(StoreError::ReservationUnderflow {
                reserved: ledger.reserved,
                requested: amount,
            });
        }

        ledger.reserved -= amount;
        ledger.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create(&self, job: &GenerationJob) -> Result<()> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<GenerationJob>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn mark_queued(&self, id: &JobId, provider_handle: &str) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id).ok_or(StoreError::NotFound {
            entity: "job",
            id: id.to_string(),
        })?;
        job.provider_handle = Some(provider_handle.to_string());
        job.status = JobStatus::Queued;
        Ok(())
    }

    async fn try_settle(&self, id: &JobId) -> Result<bool> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id).ok_or(StoreError::NotFound {
            entity: "job",
            id: id.to_string(),
        })?;
        if job.settled {
            return Ok(false);
        }
        job.settled = true;
        Ok(true)
    }

    async fn mark_completed(&self, id: &JobId, result_url: &str) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id).ok_or(StoreError::NotFound {
            entity: "job",
            id: id.to_string(),
        })?;
        if job.is_terminal() {
            return Ok(());
        }
        job.status = JobStatus::Completed;
        job.result_url = Some(result_url.to_string());
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_failed(&self, id: &JobId, error_message: &str) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id).ok_or(StoreError::NotFound {
            entity: "job",
            id: id.to_string(),
        })?;
        if job.is_terminal() {
            return Ok(());
        }
        job.status = JobStatus::Failed;
        job.error_message = Some(error_message.to_string());
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn count_active(&self, user_id: &UserId) -> Result<usize> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.user_id == *user_id && !j.is_terminal())
            .count())
    }

    async fn list_active(&self, user_id: &UserId) -> Result<Vec<GenerationJob>> {
        let mut jobs: Vec<_> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.user_id == *user_id && !j.is_terminal())
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.started_at);
        Ok(jobs)
    }

    async fn list_all_active(&self) -> Result<Vec<GenerationJob>> {
        let mut jobs: Vec<_> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| !j.is_terminal())
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.started_at);
        Ok(jobs)
    }

    async fn list_recent(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<GenerationJob>> {
        let mut jobs: Vec<_> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| {
                j.user_id == *user_id
                    && j.is_terminal()
                    && j.completed_at.is_some_and(|t| t >= since)
            })
            .cloned()
            .collect();
        jobs.sort_by_key(|j| std::cmp::Reverse(j.completed_at));
        Ok(jobs)
    }
}

#[async_trait]
impl AssetStore for MemoryStore {
    async fn put(&self, asset: &GeneratedAsset) -> Result<()> {
        self.assets.write().await.push(asset.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId, limit: usize) -> Result<Vec<GeneratedAsset>> {
        let assets = self.assets.read().await;
        let mut out: Vec<_> = assets
            .iter()
            .filter(|a| a.user_id == *user_id)
            .cloned()
            .collect();
        // AssetId is a ULID, so sorting by id is newest-first when reversed.
        out.sort_by_key(|a| std::cmp::Reverse(a.created_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn list_for_job(&self, job_id: &JobId) -> Result<Vec<GeneratedAsset>> {
        Ok(self
            .assets
            .read()
            .await
            .iter()
            .filter(|a| a.job_id == *job_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::Arc;
    use studio_core::{GenerationParams, ModelType};

    fn new_job(user_id: UserId, cost: i64) -> GenerationJob {
        GenerationJob::new(
            user_id,
            "lumina-image-1",
            ModelType::Image,
            "test prompt",
            GenerationParams::default(),
            cost,
        )
    }

    #[tokio::test]
    async fn reserve_commit_conserves_tickets() {
        let store = MemoryStore::new();
        let user = UserId::generate();
        store.grant(&user, 10).await.unwrap();

        let snapshot = store.reserve(&user, 4).await.unwrap();
        assert_eq!(snapshot.reserved, 4);
        assert_eq!(snapshot.available, 6);

        store.commit(&user, 4).await.unwrap();
        let ledger = store.get_ledger(&user).await.unwrap().unwrap();
        assert_eq!(ledger.balance, 6);
        assert_eq!(ledger.reserved, 0);
        assert_eq!(ledger.total_used, 4);
    }

    #[tokio::test]
    async fn release_restores_reservation_without_charging() {
        let store = MemoryStore::new();
        let user = UserId::generate();
        store.grant(&user, 10).await.unwrap();

        store.reserve(&user, 5).await.unwrap();
        store.release(&user, 5).await.unwrap();

        let ledger = store.get_ledger(&user).await.unwrap().unwrap();
        assert_eq!(ledger.balance, 10);
        assert_eq!(ledger.reserved, 0);
        assert_eq!(ledger.total_used, 0);
    }

    #[tokio::test]
    async fn reserve_reports_true_availability() {
        let store = MemoryStore::new();
        let user = UserId::generate();
        store.grant(&user, 10).await.unwrap();
        store.reserve(&user, 6).await.unwrap();

        let err = store.reserve(&user, 6).await.unwrap_err();
        match err {
            StoreError::InsufficientTickets {
                available,
                required,
            } => {
                assert_eq!(available, 4);
                assert_eq!(required, 6);
            }
            other => panic!("unexpected error: {other}"),
        }

        // The losing attempt must not leave a partial hold behind.
        let ledger = store.get_ledger(&user).await.unwrap().unwrap();
        assert_eq!(ledger.reserved, 6);
    }

    #[tokio::test]
    async fn concurrent_reserves_admit_exactly_one_when_headroom_fits_one() {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::generate();
        store.grant(&user, 10).await.unwrap();

        let attempts = (0..2).map(|_| {
            let store = Arc::clone(&store);
            async move { store.reserve(&user, 6).await }
        });
        let results = join_all(attempts).await;

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);

        let ledger = store.get_ledger(&user).await.unwrap().unwrap();
        assert_eq!(ledger.reserved, 6);
        assert_eq!(ledger.available(), 4);
    }

    #[tokio::test]
    async fn reserve_without_ledger_is_rejected() {
        let store = MemoryStore::new();
        let err = store.reserve(&UserId::generate(), 1).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "ledger", .. }));
    }

    #[tokio::test]
    async fn commit_is_bounded_by_reservation() {
        let store = MemoryStore::new();
        let user = UserId::generate();
        store.grant(&user, 10).await.unwrap();
        store.reserve(&user, 3).await.unwrap();

        let err = store.commit(&user, 5).await.unwrap_err();
        assert!(matches!(err, StoreError::ReservationUnderflow { .. }));

        // Balance untouched by the failed commit.
        let ledger = store.get_ledger(&user).await.unwrap().unwrap();
        assert_eq!(ledger.balance, 10);
    }

    #[tokio::test]
    async fn try_settle_wins_once() {
        let store = MemoryStore::new();
        let user = UserId::generate();
        let job = new_job(user, 2);
        store.create(&job).await.unwrap();

        assert!(store.try_settle(&job.id).await.unwrap());
        assert!(!store.try_settle(&job.id).await.unwrap());
    }

    #[tokio::test]
    async fn terminal_transitions_are_idempotent_safe() {
        let store = MemoryStore::new();
        let user = UserId::generate();
        let job = new_job(user, 2);
        store.create(&job).await.unwrap();

        store
            .mark_completed(&job.id, "https://cdn.example/a.png")
            .await
            .unwrap();
        // A late failure signal must not clobber the completed state.
        store.mark_failed(&job.id, "late timeout").await.unwrap();

        let stored = store.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.result_url.as_deref(), Some("https://cdn.example/a.png"));
        assert!(stored.error_message.is_none());
    }

    #[tokio::test]
    async fn listings_split_active_and_recent() {
        let store = MemoryStore::new();
        let user = UserId::generate();
        let active = new_job(user, 1);
        let finished = new_job(user, 1);
        store.create(&active).await.unwrap();
        store.create(&finished).await.unwrap();
        store
            .mark_completed(&finished.id, "https://cdn.example/x.png")
            .await
            .unwrap();

        let active_jobs = store.list_active(&user).await.unwrap();
        assert_eq!(active_jobs.len(), 1);
        assert_eq!(active_jobs[0].id, active.id);
        assert_eq!(store.count_active(&user).await.unwrap(), 1);

        let since = Utc::now() - chrono::Duration::minutes(5);
        let recent = store.list_recent(&user, since).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, finished.id);
    }
}
