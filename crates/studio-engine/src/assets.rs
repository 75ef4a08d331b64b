//! Durable asset storage boundary.
//!
//! Providers host finished outputs on ephemeral URLs that expire within
//! hours. [`AssetSink::persist`] copies one output into storage we own and
//! returns the durable URL that goes into the asset record.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::debug;

use studio_core::JobId;

/// Errors from persisting a provider output.
#[derive(Debug, thiserror::Error)]
pub enum AssetSinkError {
    /// Downloading the provider-hosted output failed.
    #[error("download failed: {0}")]
    Download(String),

    /// Writing the output to durable storage failed.
    #[error("write failed: {0}")]
    Write(String),
}

/// Copies provider-hosted outputs into durable storage.
#[async_trait]
pub trait AssetSink: Send + Sync {
    /// Persist one output of a job; `index` distinguishes siblings.
    ///
    /// Returns the durable URL of the stored copy.
    ///
    /// # Errors
    ///
    /// Returns an [`AssetSinkError`] when the download or write fails.
    async fn persist(
        &self,
        job_id: &JobId,
        index: usize,
        source_url: &str,
    ) -> Result<String, AssetSinkError>;
}

/// Downloads outputs over HTTP and writes them under a local directory.
///
/// The durable URL is `{base_url}/{job_id}-{index}.{ext}`, served by
/// whatever fronts the directory (out of scope here).
pub struct HttpAssetSink {
    client: Client,
    asset_dir: PathBuf,
    base_url: String,
}

impl HttpAssetSink {
    /// Create a sink writing into `asset_dir`, publishing under `base_url`.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with
    /// default settings).
    pub fn new(asset_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            asset_dir: asset_dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn extension(source_url: &str) -> &str {
        let path = source_url.split(['?', '#']).next().unwrap_or(source_url);
        match path.rsplit('.').next() {
            Some(ext @ ("png" | "jpg" | "jpeg" | "webp" | "gif" | "mp4" | "webm")) => ext,
            _ => "bin",
        }
    }
}

#[async_trait]
impl AssetSink for HttpAssetSink {
    async fn persist(
        &self,
        job_id: &JobId,
        index: usize,
        source_url: &str,
    ) -> Result<String, AssetSinkError> {
        let response = self
            .client
            .get(source_url)
            .send()
            .await
            .map_err(|e| AssetSinkError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AssetSinkError::Download(format!(
                "HTTP {} fetching {source_url}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AssetSinkError::Download(e.to_string()))?;

        let filename = format!("{job_id}-{index}.{}", Self::extension(source_url));
        let path = self.asset_dir.join(&filename);

        tokio::fs::create_dir_all(&self.asset_dir)
            .await
            .map_err(|e| AssetSinkError::Write(e.to_string()))?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AssetSinkError::Write(e.to_string()))?;

        debug!(job_id = %job_id, bytes = bytes.len(), file = %filename, "asset persisted");
        Ok(format!("{}/{filename}", self.base_url))
    }
}

/// Records persisted outputs in memory. Test double for [`HttpAssetSink`].
#[derive(Default)]
pub struct InMemoryAssetSink {
    stored: Mutex<Vec<(JobId, String)>>,
    failing: AtomicBool,
}

impl InMemoryAssetSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `persist` call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Source URLs persisted so far.
    pub async fn stored(&self) -> Vec<(JobId, String)> {
        self.stored.lock().await.clone()
    }
}

#[async_trait]
impl AssetSink for InMemoryAssetSink {
    async fn persist(
        &self,
        job_id: &JobId,
        index: usize,
        source_url: &str,
    ) -> Result<String, AssetSinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AssetSinkError::Write("sink unavailable".to_string()));
        }
        self.stored
            .lock()
            .await
            .push((*job_id, source_url.to_string()));
        Ok(format!("memory://assets/{job_id}-{index}"))
    }
}
