//! Client error types.

/// Errors that can occur when using the studio client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Insufficient tickets for the requested generation.
    #[error("insufficient tickets: available={available}, required={required}")]
    InsufficientTickets {
        /// Tickets currently available.
        available: i64,
        /// Tickets the generation would cost.
        required: i64,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
