//! Error types for studio storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of record ("ledger", "job", ...).
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// Not enough available tickets for the reservation.
    #[error("insufficient tickets: available={available}, required={required}")]
    InsufficientTickets {
        /// Tickets currently available (`balance - reserved`).
        available: i64,
        /// Tickets the reservation asked for.
        required: i64,
    },

    /// A commit or release asked for more than is currently reserved.
    ///
    /// Settlement amounts are bounded by prior reservations; hitting this
    /// means a double-settlement was attempted.
    #[error("reservation underflow: reserved={reserved}, requested={requested}")]
    ReservationUnderflow {
        /// Tickets currently reserved.
        reserved: i64,
        /// Tickets the settlement asked for.
        requested: i64,
    },

    /// Non-positive amount passed to a ledger mutation.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(feature = "postgres-backend")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}
