//! PostgreSQL schema definitions.
//!
//! Applied by [`crate::PgStore::init_schema`]; every statement is
//! `IF NOT EXISTS` so startup is idempotent.

/// Ticket ledgers: one row per user.
///
/// `balance`, `reserved` and `total_used` are plain counters; the check
/// constraints encode the invariants every mutation must preserve.
pub const CREATE_TICKET_LEDGERS: &str = r"
CREATE TABLE IF NOT EXISTS ticket_ledgers (
    user_id     UUID PRIMARY KEY,
    balance     BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0),
    reserved    BIGINT NOT NULL DEFAULT 0 CHECK (reserved >= 0),
    total_used  BIGINT NOT NULL DEFAULT 0 CHECK (total_used >= 0),
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    CHECK (reserved <= balance)
)
";

/// Generation jobs: the audit trail and reconciler source of truth.
pub const CREATE_GENERATION_JOBS: &str = r"
CREATE TABLE IF NOT EXISTS generation_jobs (
    id               UUID PRIMARY KEY,
    user_id          UUID NOT NULL,
    model_id         TEXT NOT NULL,
    model_type       TEXT NOT NULL,
    prompt           TEXT NOT NULL,
    params           JSONB NOT NULL,
    status           TEXT NOT NULL,
    ticket_cost      BIGINT NOT NULL,
    provider_handle  TEXT,
    settled          BOOLEAN NOT NULL DEFAULT FALSE,
    result_url       TEXT,
    error_message    TEXT,
    started_at       TIMESTAMPTZ NOT NULL,
    completed_at     TIMESTAMPTZ
)
";

/// Index for per-user in-flight cap checks and active listings.
pub const CREATE_JOBS_USER_STATUS_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_jobs_user_status
    ON generation_jobs (user_id, status)
";

/// Index for the reconciler's active-job sweep.
pub const CREATE_JOBS_STATUS_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_jobs_status
    ON generation_jobs (status)
    WHERE status IN ('queued', 'processing')
";

/// Generated assets: durable records pointing at stored output files.
pub const CREATE_GENERATED_ASSETS: &str = r"
CREATE TABLE IF NOT EXISTS generated_assets (
    id           TEXT PRIMARY KEY,
    job_id       UUID NOT NULL,
    user_id      UUID NOT NULL,
    url          TEXT NOT NULL,
    model_id     TEXT NOT NULL,
    prompt       TEXT NOT NULL,
    ticket_cost  BIGINT NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL,
    expires_at   TIMESTAMPTZ NOT NULL
)
";

/// Index for per-user asset listings, newest first.
pub const CREATE_ASSETS_USER_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_assets_user_created
    ON generated_assets (user_id, created_at DESC)
";

/// Index for per-job asset lookups.
pub const CREATE_ASSETS_JOB_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_assets_job
    ON generated_assets (job_id)
";

/// All statements in application order.
pub const ALL: &[&str] = &[
    CREATE_TICKET_LEDGERS,
    CREATE_GENERATION_JOBS,
    CREATE_JOBS_USER_STATUS_INDEX,
    CREATE_JOBS_STATUS_INDEX,
    CREATE_GENERATED_ASSETS,
    CREATE_ASSETS_USER_INDEX,
    CREATE_ASSETS_JOB_INDEX,
];
