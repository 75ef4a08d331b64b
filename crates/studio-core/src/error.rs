//! Error taxonomy for the generation core.
//!
//! Provider-specific failures are mapped into this shared taxonomy before
//! they reach the ledger paths, so refunds never need to be provider-aware.

/// Result type for studio operations.
pub type Result<T> = std::result::Result<T, StudioError>;

/// Errors that can occur in generation-core operations.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    /// Not enough available tickets for the reservation.
    ///
    /// Raised before any provider cost is incurred.
    #[error("insufficient tickets: available={available}, required={required}")]
    InsufficientTickets {
        /// Tickets currently available (`balance - reserved`).
        available: i64,
        /// Tickets the generation would cost.
        required: i64,
    },

    /// No ticket ledger exists for the user.
    #[error("no tickets provisioned for user {user_id}")]
    NoLedger {
        /// The user without a ledger row.
        user_id: String,
    },

    /// The per-user in-flight generation cap was hit.
    #[error("too many generations in flight (limit {limit})")]
    TooManyInFlight {
        /// The configured cap.
        limit: usize,
    },

    /// No job exists with the given id (or it belongs to another user).
    #[error("unknown job: {job_id}")]
    JobNotFound {
        /// The job id that was looked up.
        job_id: String,
    },

    /// The model id is not in the catalog.
    #[error("unknown model: {model_id}")]
    UnknownModel {
        /// The unrecognized model id.
        model_id: String,
    },

    /// Request parameters out of range or inconsistent for the model.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The provider rejected the generation (content policy or validation).
    ///
    /// Refunded automatically; user-correctable.
    #[error("generation rejected by provider: {0}")]
    ProviderRejected(String),

    /// The provider was unreachable or returned a server error.
    ///
    /// Refunded automatically; transient.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider did not reach a terminal state in time.
    ///
    /// Refunded automatically.
    #[error("provider timed out")]
    ProviderTimeout,

    /// Downloading or storing a generated asset failed after a successful
    /// provider call.
    ///
    /// Refunded; logged as an operational anomaly since real provider cost
    /// was incurred with no user charge.
    #[error("failed to persist generated asset: {0}")]
    PersistenceFailure(String),

    /// Storage layer failure.
    #[error("storage error: {0}")]
    Storage(String),
}
