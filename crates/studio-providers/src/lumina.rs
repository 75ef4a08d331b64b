//! Lumina synchronous image API client.
//!
//! Lumina resolves the generation within the HTTP request itself, so a
//! submission blocks for tens of seconds and returns finished image URLs.
//! There is no handle to poll.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use studio_core::{GenerationRequest, Quality};

use crate::error::{ProviderError, Result};
use crate::{ProviderAdapter, Submission, SyncResult};

/// Upper bound on how long one synchronous generation may block.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for the Lumina image generation API.
#[derive(Debug, Clone)]
pub struct LuminaClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct ImagesRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    quality: Quality,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<&'a str>,
}

#[derive(Deserialize)]
struct ImagesResponse {
    images: Vec<ImageOutput>,
}

#[derive(Deserialize)]
struct ImageOutput {
    url: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl LuminaClient {
    /// Create a new Lumina client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with
    /// default settings).
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn map_error(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body: std::result::Result<ErrorResponse, _> = response.json().await;

        match body {
            Ok(parsed) => match parsed.error.code.as_str() {
                "content_policy_violation" => ProviderError::ContentPolicy(parsed.error.message),
                _ if status == StatusCode::BAD_REQUEST => {
                    ProviderError::InvalidParameters(parsed.error.message)
                }
                _ => ProviderError::Unavailable(format!(
                    "HTTP {status}: {}",
                    parsed.error.message
                )),
            },
            Err(_) if status == StatusCode::BAD_REQUEST => {
                ProviderError::InvalidParameters(format!("HTTP {status}"))
            }
            Err(_) => ProviderError::Unavailable(format!("HTTP {status}")),
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for LuminaClient {
    fn id(&self) -> &'static str {
        "lumina"
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission> {
        let url = format!("{}/v1/images", self.base_url);
        let body = ImagesRequest {
            model: &request.model_id,
            prompt: &request.prompt,
            n: request.params.outputs,
            quality: request.params.quality,
            aspect_ratio: request.params.aspect_ratio.as_deref(),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::map_error(response).await);
        }

        let parsed: ImagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if parsed.images.is_empty() {
            return Err(ProviderError::Malformed(
                "success response carried no images".to_string(),
            ));
        }

        Ok(Submission::Completed(SyncResult {
            urls: parsed.images.into_iter().map(|i| i.url).collect(),
        }))
    }
}
