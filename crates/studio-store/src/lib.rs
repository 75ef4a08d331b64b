//! Storage layer for the Design Studio generation platform.
//!
//! This crate provides the persistence traits consumed by the orchestrator
//! and reconciler, plus two backends:
//!
//! - [`MemoryStore`] — always available; used by tests and local development.
//! - [`PgStore`] — PostgreSQL via `sqlx` (feature `postgres-backend`,
//!   enabled by default).
//!
//! # Atomicity
//!
//! Every ledger mutation is a single atomic row update. In particular,
//! [`LedgerStore::reserve`] is one conditional update
//! (`reserved = reserved + n WHERE balance - reserved >= n`), never a
//! read-then-write, so two concurrent reservations against the same row
//! can never both observe headroom that only fits one of them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
#[cfg(feature = "postgres-backend")]
pub mod postgres;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "postgres-backend")]
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use studio_core::{BalanceSnapshot, GeneratedAsset, GenerationJob, JobId, TicketLedger, UserId};

/// Ticket ledger operations.
///
/// One row per user; mutated only through these operations.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create a zero-balance ledger for the user if none exists.
    ///
    /// Idempotent: returns the existing ledger when one is already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn provision(&self, user_id: UserId) -> Result<TicketLedger>;

    /// Get a ledger by user id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_ledger(&self, user_id: &UserId) -> Result<Option<TicketLedger>>;

    /// Add tickets to a user's balance, creating the ledger on first grant.
    ///
    /// Returns the balance figures after the grant.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidAmount` for non-positive amounts.
    async fn grant(&self, user_id: &UserId, amount: i64) -> Result<BalanceSnapshot>;

    /// Atomically reserve `amount` tickets against the user's headroom.
    ///
    /// Implemented as a single conditional update; succeeds only when
    /// `balance - reserved >= amount` held at the instant of the update.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if no ledger exists for the user.
    /// - `StoreError::InsufficientTickets` reporting the true available
    ///   amount when the reservation does not fit.
    async fn reserve(&self, user_id: &UserId, amount: i64) -> Result<BalanceSnapshot>;

    /// Settle a reservation as consumed: `balance -= amount`,
    /// `reserved -= amount`, `total_used += amount`, atomically.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if no ledger exists for the user.
    /// - `StoreError::ReservationUnderflow` if `amount` exceeds the
    ///   currently reserved total (commit is bounded by prior reserves).
    async fn commit(&self, user_id: &UserId, amount: i64) -> Result<()>;

    /// Release a reservation without charging: `reserved -= amount`,
    /// balance unchanged, atomically.
    ///
    /// # Errors
    ///
    /// Same error contract as [`LedgerStore::commit`].
    async fn release(&self, user_id: &UserId, amount: i64) -> Result<()>;
}

/// Generation job records.
///
/// Job tracking is observability: callers treat insert failures as
/// non-fatal. Terminal transitions are idempotent-safe and the `settled`
/// flag is the atomic commit-or-release gate.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn create(&self, job: &GenerationJob) -> Result<()>;

    /// Get a job by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_job(&self, id: &JobId) -> Result<Option<GenerationJob>>;

    /// Record the provider-side handle and move the job to `queued`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the job does not exist.
    async fn mark_queued(&self, id: &JobId, provider_handle: &str) -> Result<()>;

    /// Atomically check-and-set the job's `settled` flag.
    ///
    /// Returns `true` exactly once per job; every later caller gets
    /// `false`. This is the guard that keeps commit/release from running
    /// twice when completion, timeout, and failure signals race.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the job does not exist.
    async fn try_settle(&self, id: &JobId) -> Result<bool>;

    /// Terminal success transition. Idempotent-safe: a job already in a
    /// terminal state is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the job does not exist.
    async fn mark_completed(&self, id: &JobId, result_url: &str) -> Result<()>;

    /// Terminal failure transition. Idempotent-safe, like
    /// [`JobStore::mark_completed`]. The message must already be truncated.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the job does not exist.
    async fn mark_failed(&self, id: &JobId, error_message: &str) -> Result<()>;

    /// Count a user's non-terminal jobs (in-flight cap check).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn count_active(&self, user_id: &UserId) -> Result<usize>;

    /// Non-terminal jobs for a user, oldest first (reload recovery).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_active(&self, user_id: &UserId) -> Result<Vec<GenerationJob>>;

    /// Non-terminal jobs across all users (reconciler sweep).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_all_active(&self) -> Result<Vec<GenerationJob>>;

    /// Terminal jobs for a user since `since`, newest first (used to
    /// surface jobs that finished while the client was disconnected).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_recent(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<GenerationJob>>;
}

/// Durable generated-asset records.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Insert an asset row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn put(&self, asset: &GeneratedAsset) -> Result<()>;

    /// List a user's assets, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_for_user(&self, user_id: &UserId, limit: usize) -> Result<Vec<GeneratedAsset>>;

    /// List the assets produced by one job.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_for_job(&self, job_id: &JobId) -> Result<Vec<GeneratedAsset>>;
}
