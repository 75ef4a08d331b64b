//! PostgreSQL storage backend.
//!
//! Ledger mutations are single conditional `UPDATE` statements; the row
//! lock Postgres takes for the update is the only synchronization needed,
//! so concurrent reservations serialize without explicit transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::info;

use studio_core::{
    AssetId, BalanceSnapshot, GeneratedAsset, GenerationJob, JobId, TicketLedger, UserId,
};

use crate::error::{Result, StoreError};
use crate::schema;
use crate::{AssetStore, JobStore, LedgerStore};

const ACTIVE_STATUSES: [&str; 2] = ["queued", "processing"];

/// PostgreSQL implementation of all storage traits.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database and build a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Build a store from an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the schema. Idempotent; safe to run at every startup.
    ///
    /// # Errors
    ///
    /// Returns an error if a DDL statement fails.
    pub async fn init_schema(&self) -> Result<()> {
        for statement in schema::ALL {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("database schema initialized");
        Ok(())
    }
}

fn ensure_positive(amount: i64) -> Result<()> {
    if amount > 0 {
        Ok(())
    } else {
        Err(StoreError::InvalidAmount(amount))
    }
}

fn ledger_from_row(row: &PgRow) -> Result<TicketLedger> {
    Ok(TicketLedger {
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        balance: row.try_get("balance")?,
        reserved: row.try_get("reserved")?,
        total_used: row.try_get("total_used")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn job_from_row(row: &PgRow) -> Result<GenerationJob> {
    let model_type: String = row.try_get("model_type")?;
    let status: String = row.try_get("status")?;
    let params: serde_json::Value = row.try_get("params")?;
    Ok(GenerationJob {
        id: JobId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        model_id: row.try_get("model_id")?,
        model_type: model_type.parse().map_err(StoreError::Serialization)?,
        prompt: row.try_get("prompt")?,
        params: serde_json::from_value(params)
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        status: status.parse().map_err(StoreError::Serialization)?,
        ticket_cost: row.try_get("ticket_cost")?,
        provider_handle: row.try_get("provider_handle")?,
        settled: row.try_get("settled")?,
        result_url: row.try_get("result_url")?,
        error_message: row.try_get("error_message")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn asset_from_row(row: &PgRow) -> Result<GeneratedAsset> {
    let id: String = row.try_get("id")?;
    let model_id: String = row.try_get("model_id")?;
    Ok(GeneratedAsset {
        id: id
            .parse::<AssetId>()
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        job_id: JobId::from_uuid(row.try_get("job_id")?),
        model_id,
        prompt: row.try_get("prompt")?,
        url: row.try_get("url")?,
        ticket_cost: row.try_get("ticket_cost")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn provision(&self, user_id: UserId) -> Result<TicketLedger> {
        sqlx::query(
            "INSERT INTO ticket_ledgers (user_id) VALUES ($1)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT * FROM ticket_ledgers WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        ledger_from_row(&row)
    }

    async fn get_ledger(&self, user_id: &UserId) -> Result<Option<TicketLedger>> {
        let row = sqlx::query("SELECT * FROM ticket_ledgers WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(ledger_from_row).transpose()
    }

    async fn grant(&self, user_id: &UserId, amount: i64) -> Result<BalanceSnapshot> {
        ensure_positive(amount)?;
        let row = sqlx::query(
            "INSERT INTO ticket_ledgers (user_id, balance) VALUES ($1, $2)
             ON CONFLICT (user_id) DO UPDATE
                 SET balance = ticket_ledgers.balance + $2,
                     updated_at = now()
             RETURNING balance, reserved",
        )
        .bind(user_id.as_uuid())
        .bind(amount)
        .fetch_one(&self.pool)
        .await?;

        let balance: i64 = row.try_get("balance")?;
        let reserved: i64 = row.try_get("reserved")?;
        Ok(BalanceSnapshot {
            balance,
            reserved,
            available: balance - reserved,
        })
    }

    async fn reserve(&self, user_id: &UserId, amount: i64) -> Result<BalanceSnapshot> {
        ensure_positive(amount)?;
        // The WHERE clause makes the headroom check and the hold one
        // statement; a losing concurrent reservation matches zero rows.
        let row = sqlx::query(
            "UPDATE ticket_ledgers
                SET reserved = reserved + $2, updated_at = now()
              WHERE user_id = $1 AND balance - reserved >= $2
             RETURNING balance, reserved",
        )
        .bind(user_id.as_uuid())
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            let balance: i64 = row.try_get("balance")?;
            let reserved: i64 = row.try_get("reserved")?;
            return Ok(BalanceSnapshot {
                balance,
                reserved,
                available: balance - reserved,
            });
        }

        // Zero rows: either no ledger or not enough headroom. Re-read to
        // report which, with the availability at rejection time.
        match self.get_ledger(user_id).await? {
            Some(ledger) => Err(StoreError::InsufficientTickets {
                available: ledger.available(),
                required: amount,
            }),
            None => Err(StoreError::NotFound {
                entity: "ledger",
                id: user_id.to_string(),
            }),
        }
    }

    async fn commit(&self, user_id: &UserId, amount: i64) -> Result<()> {
        ensure_positive(amount)?;
        let result = sqlx::query(
            "UPDATE ticket_ledgers
                SET balance = balance - $2,
                    reserved = reserved - $2,
                    total_used = total_used + $2,
                    updated_at = now()
              WHERE user_id = $1 AND reserved >= $2",
        )
        .bind(user_id.as_uuid())
        .bind(amount)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        match self.get_ledger(user_id).await? {
            Some(ledger) => Err(StoreError::ReservationUnderflow {
                reserved: ledger.reserved,
                requested: amount,
            }),
            None => Err(StoreError::NotFound {
                entity: "ledger",
                id: user_id.to_string(),
            }),
        }
    }

    async fn release(&self, user_id: &UserId, amount: i64) -> Result<()> {
        ensure_positive(amount)?;
        let result = sqlx::query(
            "UPDATE ticket_ledgers
                SET reserved = reserved - $2, updated_at = now()
              WHERE user_id = $1 AND reserved >= $2",
        )
        .bind(user_id.as_uuid())
        .bind(amount)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        match self.get_ledger(user_id).await? {
            Some(ledger) => Err(StoreError::ReservationUnderflow {
                reserved: ledger.reserved,
                requested: amount,
            }),
            None => Err(StoreError::NotFound {
                entity: "ledger",
                id: user_id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn create(&self, job: &GenerationJob) -> Result<()> {
        let params = serde_json::to_value(&job.params)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        sqlx::query(
            "INSERT INTO generation_jobs
                 (id, user_id, model_id, model_type, prompt, params, status,
                  ticket_cost, provider_handle, settled, result_url,
                  error_message, started_at, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(job.id.as_uuid())
        .bind(job.user_id.as_uuid())
        .bind(&job.model_id)
        .bind(job.model_type.as_str())
        .bind(&job.prompt)
        .bind(params)
        .bind(job.status.as_str())
        .bind(job.ticket_cost)
        .bind(&job.provider_handle)
        .bind(job.settled)
        .bind(&job.result_url)
        .bind(&job.error_message)
        .bind(job.started_at)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<GenerationJob>> {
        let row = sqlx::query("SELECT * FROM generation_jobs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    async fn mark_queued(&self, id: &JobId, provider_handle: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE generation_jobs
                SET provider_handle = $2, status = 'queued'
              WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(provider_handle)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                entity: "job",
                id: id.to_string(),
            })
        }
    }

    async fn try_settle(&self, id: &JobId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE generation_jobs SET settled = TRUE
              WHERE id = $1 AND settled = FALSE",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        // Lost the race, or the job was never recorded.
        if self.get_job(id).await?.is_some() {
            Ok(false)
        } else {
            Err(StoreError::NotFound {
                entity: "job",
                id: id.to_string(),
            })
        }
    }

    async fn mark_completed(&self, id: &JobId, result_url: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE generation_jobs
                SET status = 'completed', result_url = $2, completed_at = now()
              WHERE id = $1 AND status = ANY($3)",
        )
        .bind(id.as_uuid())
        .bind(result_url)
        .bind(&ACTIVE_STATUSES[..])
        .execute(&self.pool)
        .await?;

        // Zero rows with an existing row means the job was already
        // terminal; that is a no-op, not an error.
        if result.rows_affected() == 1 || self.get_job(id).await?.is_some() {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                entity: "job",
                id: id.to_string(),
            })
        }
    }

    async fn mark_failed(&self, id: &JobId, error_message: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE generation_jobs
                SET status = 'failed', error_message = $2, completed_at = now()
              WHERE id = $1 AND status = ANY($3)",
        )
        .bind(id.as_uuid())
        .bind(error_message)
        .bind(&ACTIVE_STATUSES[..])
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 || self.get_job(id).await?.is_some() {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                entity: "job",
                id: id.to_string(),
            })
        }
    }

    async fn count_active(&self, user_id: &UserId) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM generation_jobs
              WHERE user_id = $1 AND status = ANY($2)",
        )
        .bind(user_id.as_uuid())
        .bind(&ACTIVE_STATUSES[..])
        .fetch_one(&self.pool)
        .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn list_active(&self, user_id: &UserId) -> Result<Vec<GenerationJob>> {
        let rows = sqlx::query(
            "SELECT * FROM generation_jobs
              WHERE user_id = $1 AND status = ANY($2)
              ORDER BY started_at ASC",
        )
        .bind(user_id.as_uuid())
        .bind(&ACTIVE_STATUSES[..])
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(job_from_row).collect()
    }

    async fn list_all_active(&self) -> Result<Vec<GenerationJob>> {
        let rows = sqlx::query(
            "SELECT * FROM generation_jobs
              WHERE status = ANY($1)
              ORDER BY started_at ASC",
        )
        .bind(&ACTIVE_STATUSES[..])
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(job_from_row).collect()
    }

    async fn list_recent(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<GenerationJob>> {
        let rows = sqlx::query(
            "SELECT * FROM generation_jobs
              WHERE user_id = $1
                AND status IN ('completed', 'failed')
                AND completed_at >= $2
              ORDER BY completed_at DESC",
        )
        .bind(user_id.as_uuid())
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(job_from_row).collect()
    }
}

#[async_trait]
impl AssetStore for PgStore {
    async fn put(&self, asset: &GeneratedAsset) -> Result<()> {
        sqlx::query(
            "INSERT INTO generated_assets
                 (id, job_id, user_id, url, model_id, prompt,
                  ticket_cost, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(asset.id.to_string())
        .bind(asset.job_id.as_uuid())
        .bind(asset.user_id.as_uuid())
        .bind(&asset.url)
        .bind(&asset.model_id)
        .bind(&asset.prompt)
        .bind(asset.ticket_cost)
        .bind(asset.created_at)
        .bind(asset.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId, limit: usize) -> Result<Vec<GeneratedAsset>> {
        let rows = sqlx::query(
            "SELECT * FROM generated_assets
              WHERE user_id = $1
              ORDER BY created_at DESC
              LIMIT $2",
        )
        .bind(user_id.as_uuid())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(asset_from_row).collect()
    }

    async fn list_for_job(&self, job_id: &JobId) -> Result<Vec<GeneratedAsset>> {
        let rows = sqlx::query(
            "SELECT * FROM generated_assets
              WHERE job_id = $1
              ORDER BY id ASC",
        )
        .bind(job_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(asset_from_row).collect()
    }
}
