//! Provider adapters for external generative AI vendors.
//!
//! Each vendor gets one adapter implementing [`ProviderAdapter`]. Three
//! call conventions exist in the wild and each has a representative here:
//!
//! - [`LuminaClient`] — synchronous image API; the HTTP call blocks until
//!   the images exist (tens of seconds).
//! - [`FluxQueueClient`] — queue-based asynchronous image API; submission
//!   returns a request id that must be polled.
//! - [`VireoClient`] — asynchronous video API; same polling convention
//!   with render times in the minutes.
//!
//! Vendor-specific failure shapes are mapped into [`ProviderError`] inside
//! each adapter, so callers see one taxonomy regardless of vendor.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod fluxqueue;
pub mod lumina;
pub mod registry;
pub mod vireo;

pub use error::{ProviderError, Result};
pub use fluxqueue::FluxQueueClient;
pub use lumina::LuminaClient;
pub use registry::ProviderRegistry;
pub use vireo::VireoClient;

use async_trait::async_trait;
use studio_core::GenerationRequest;

/// Output of a successful synchronous submission.
#[derive(Debug, Clone)]
pub struct SyncResult {
    /// Provider-hosted output URLs, in provider order.
    pub urls: Vec<String>,
}

/// Provider-side correlation handle for an asynchronous job.
#[derive(Debug, Clone)]
pub struct AsyncHandle {
    /// Opaque vendor id used for later polling.
    pub handle: String,
    /// Queue position at submission time, if the vendor reports one.
    pub queue_position: Option<u32>,
}

/// What a submission produced.
#[derive(Debug, Clone)]
pub enum Submission {
    /// The adapter resolved the call within the request lifetime.
    Completed(SyncResult),
    /// The vendor accepted the job; poll the handle for the outcome.
    Pending(AsyncHandle),
}

/// Provider-side lifecycle state reported by a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Waiting in the vendor's queue.
    Queued,
    /// Being generated.
    Processing,
    /// Finished; `urls` carries the outputs.
    Completed,
    /// Failed; `error` carries the vendor's description.
    Failed,
}

/// One observation of an asynchronous job's state.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    /// Lifecycle state at poll time.
    pub state: PollState,
    /// Queue position, when still queued and the vendor reports one.
    pub queue_position: Option<u32>,
    /// Provider-hosted output URLs; non-empty only when completed.
    pub urls: Vec<String>,
    /// Vendor failure description; set only when failed.
    pub error: Option<String>,
}

/// A generation provider, polymorphic over call convention.
///
/// Synchronous adapters return [`Submission::Completed`] from `submit` and
/// keep the default `poll`, which rejects with
/// [`ProviderError::PollUnsupported`].
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable adapter id, used in logs.
    fn id(&self) -> &'static str;

    /// Submit a normalized generation request to the vendor.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] mapped from the vendor's failure shape.
    async fn submit(&self, request: &GenerationRequest) -> Result<Submission>;

    /// Poll an outstanding handle. Asynchronous adapters only.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::PollUnsupported` unless overridden, or a
    /// mapped vendor error from the poll call itself.
    async fn poll(&self, handle: &str) -> Result<PollOutcome> {
        let _ = handle;
        Err(ProviderError::PollUnsupported(self.id()))
    }
}
