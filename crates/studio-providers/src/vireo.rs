//! Vireo asynchronous video API client.
//!
//! Vireo renders short clips over one to several minutes. Submission
//! returns a job id immediately; the finished clip URL arrives via
//! polling.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use studio_core::{GenerationRequest, Resolution};

use crate::error::{ProviderError, Result};
use crate::{AsyncHandle, PollOutcome, PollState, ProviderAdapter, Submission};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Vireo video generation API.
#[derive(Debug, Clone)]
pub struct VireoClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct VideoRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    duration_seconds: u32,
    resolution: Resolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<&'a str>,
}

#[derive(Deserialize)]
struct VideoResponse {
    job_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
    video_url: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// Default clip length when the request does not specify one.
const DEFAULT_DURATION_SECONDS: u32 = 5;

impl VireoClient {
    /// Create a new Vireo client.
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
            Ok(parsed) => match parsed.error.kind.as_str() {
                "moderation" => ProviderError::ContentPolicy(parsed.error.message),
                "validation" => ProviderError::InvalidParameters(parsed.error.message),
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
impl ProviderAdapter for VireoClient {
    fn id(&self) -> &'static str {
        "vireo"
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission> {
        let url = format!("{}/v1/videos", self.base_url);
        let body = VideoRequest {
            model: &request.model_id,
            prompt: &request.prompt,
            duration_seconds: request
                .params
                .duration_seconds
                .unwrap_or(DEFAULT_DURATION_SECONDS),
            resolution: request.params.resolution.unwrap_or_default(),
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

        let parsed: VideoResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(Submission::Pending(AsyncHandle {
            handle: parsed.job_id,
            queue_position: None,
        }))
    }

    async fn poll(&self, handle: &str) -> Result<PollOutcome> {
        let url = format!("{}/v1/videos/{handle}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::map_error(response).await);
        }

        let parsed: StatusResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let outcome = match parsed.status.as_str() {
            "pending" => PollOutcome {
                state: PollState::Queued,
                queue_position: None,
                urls: Vec::new(),
                error: None,
            },
            "rendering" => PollOutcome {
                state: PollState::Processing,
                queue_position: None,
                urls: Vec::new(),
                error: None,
            },
            "succeeded" => {
                let video_url = parsed.video_url.ok_or_else(|| {
                    ProviderError::Malformed("succeeded status carried no video_url".to_string())
                })?;
                PollOutcome {
                    state: PollState::Completed,
                    queue_position: None,
                    urls: vec![video_url],
                    error: None,
                }
            }
            "failed" => PollOutcome {
                state: PollState::Failed,
                queue_position: None,
                urls: Vec::new(),
                error: Some(parsed.error.unwrap_or_else(|| "render failed".to_string())),
            },
            other => {
                return Err(ProviderError::Malformed(format!(
                    "unknown video status: {other}"
                )))
            }
        };

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_core::{GenerationParams, ModelType};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> GenerationRequest {
        GenerationRequest {
            model_id: "vireo-video-1".to_string(),
            model_type: ModelType::Video,
            prompt: "drone shot over a fjord".to_string(),
            params: GenerationParams {
                duration_seconds: Some(10),
                resolution: Some(Resolution::FullHd),
                ..GenerationParams::default()
            },
        }
    }

    #[tokio::test]
    async fn submit_returns_job_handle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/videos"))
            .and(body_partial_json(serde_json::json!({
                "duration_seconds": 10,
                "resolution": "1080p",
            })))
            .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
                "job_id": "vid-9",
                "status": "pending",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = VireoClient::new(server.uri(), "v-key");
        let submission = client.submit(&request()).await.unwrap();
        match submission {
            Submission::Pending(handle) => assert_eq!(handle.handle, "vid-9"),
            Submission::Completed(_) => panic!("video adapter returned a sync result"),
        }
    }

    #[tokio::test]
    async fn poll_maps_rendering_to_processing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/vid-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "rendering",
            })))
            .mount(&server)
            .await;

        let client = VireoClient::new(server.uri(), "v-key");
        let outcome = client.poll("vid-9").await.unwrap();
        assert_eq!(outcome.state, PollState::Processing);
    }

    #[tokio::test]
    async fn poll_surfaces_finished_clip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/vid-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "succeeded",
                "video_url": "https://out.vireo.example/vid-9.mp4",
            })))
            .mount(&server)
            .await;

        let client = VireoClient::new(server.uri(), "v-key");
        let outcome = client.poll("vid-9").await.unwrap();
        assert_eq!(outcome.state, PollState::Completed);
        assert_eq!(outcome.urls, vec!["https://out.vireo.example/vid-9.mp4"]);
    }

    #[tokio::test]
    async fn moderation_rejection_maps_to_content_policy() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/videos"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"type": "moderation", "message": "prompt flagged"}
            })))
            .mount(&server)
            .await;

        let client = VireoClient::new(server.uri(), "v-key");
        let err = client.submit(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::ContentPolicy(_)));
    }

    #[tokio::test]
    async fn succeeded_without_url_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/vid-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "succeeded",
            })))
            .mount(&server)
            .await;

        let client = VireoClient::new(server.uri(), "v-key");
        let err = client.poll("vid-9").await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }
}
