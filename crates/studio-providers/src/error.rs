//! Uniform provider error taxonomy.
//!
//! Every adapter maps its vendor's failure shapes into this one enum so
//! the orchestrator's refund path never needs to know which vendor it is
//! talking to.

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors surfaced by provider adapters.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider's safety filter rejected the prompt or reference image.
    #[error("content policy rejection: {0}")]
    ContentPolicy(String),

    /// The provider is unreachable or returned a server-side error.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider rejected the request as malformed or out of range.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The request did not complete within the client timeout.
    #[error("provider timed out")]
    Timeout,

    /// The provider answered with a shape we could not interpret.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// `poll` was called on a synchronous adapter.
    #[error("adapter {0} does not support polling")]
    PollUnsupported(&'static str),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}
