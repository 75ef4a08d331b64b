//! FluxQueue asynchronous image API client.
//!
//! FluxQueue accepts a job onto a shared render queue and returns a
//! request id plus queue position. Outputs are fetched by polling. The
//! vendor reports safety-filter blocks as a distinct `blocked` status on
//! the poll side rather than rejecting at submission.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use studio_core::{GenerationRequest, Quality};

use crate::error::{ProviderError, Result};
use crate::{AsyncHandle, PollOutcome, PollState, ProviderAdapter, Submission};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the FluxQueue image generation API.
#[derive(Debug, Clone)]
pub struct FluxQueueClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct QueueRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    num_outputs: u8,
    quality: Quality,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_image_url: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueueResponse {
    request_id: String,
    queue_position: Option<u32>,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
    queue_position: Option<u32>,
    #[serde(default)]
    outputs: Vec<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    detail: String,
}

impl FluxQueueClient {
    /// Create a new FluxQueue client.
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
        let detail = response
            .json::<ErrorResponse>()
            .await
            .map_or_else(|_| format!("HTTP {status}"), |e| e.detail);

        if status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::BAD_REQUEST {
            ProviderError::InvalidParameters(detail)
        } else {
            ProviderError::Unavailable(detail)
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for FluxQueueClient {
    fn id(&self) -> &'static str {
        "fluxqueue"
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission> {
        let url = format!("{}/v1/queue/generations", self.base_url);
        let body = QueueRequest {
            model: &request.model_id,
            prompt: &request.prompt,
            num_outputs: request.params.outputs,
            quality: request.params.quality,
            aspect_ratio: request.params.aspect_ratio.as_deref(),
            reference_image_url: request.params.reference_image_url.as_deref(),
        };

        let response = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::map_error(response).await);
        }

        let parsed: QueueResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(Submission::Pending(AsyncHandle {
            handle: parsed.request_id,
            queue_position: parsed.queue_position,
        }))
    }

    async fn poll(&self, handle: &str) -> Result<PollOutcome> {
        let url = format!("{}/v1/queue/generations/{handle}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
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
            "queued" => PollOutcome {
                state: PollState::Queued,
                queue_position: parsed.queue_position,
                urls: Vec::new(),
                error: None,
            },
            "processing" => PollOutcome {
                state: PollState::Processing,
                queue_position: None,
                urls: Vec::new(),
                error: None,
            },
            "completed" => {
                if parsed.outputs.is_empty() {
                    return Err(ProviderError::Malformed(
                        "completed status carried no outputs".to_string(),
                    ));
                }
                PollOutcome {
                    state: PollState::Completed,
                    queue_position: None,
                    urls: parsed.outputs,
                    error: None,
                }
            }
            // Safety-filter blocks surface here, after queueing.
            "blocked" => PollOutcome {
                state: PollState::Failed,
                queue_position: None,
                urls: Vec::new(),
                error: Some(format!(
                    "content policy rejection: {}",
                    parsed.error.unwrap_or_else(|| "blocked".to_string())
                )),
            },
            "failed" => PollOutcome {
                state: PollState::Failed,
                queue_position: None,
                urls: Vec::new(),
                error: Some(parsed.error.unwrap_or_else(|| "generation failed".to_string())),
            },
            other => {
                return Err(ProviderError::Malformed(format!(
                    "unknown queue status: {other}"
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
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> GenerationRequest {
        GenerationRequest {
            model_id: "flux-queue-xl".to_string(),
            model_type: ModelType::Image,
            prompt: "isometric city block".to_string(),
            params: GenerationParams {
                reference_image_url: Some("https://cdn.example/ref.png".to_string()),
                ..GenerationParams::default()
            },
        }
    }

    #[tokio::test]
    async fn submit_returns_pending_handle_with_position() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/queue/generations"))
            .and(header("X-Api-Key", "fq-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "flux-queue-xl",
                "reference_image_url": "https://cdn.example/ref.png",
            })))
            .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
                "request_id": "req-42",
                "queue_position": 7,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = FluxQueueClient::new(server.uri(), "fq-key");
        let submission = client.submit(&request()).await.unwrap();

        match submission {
            Submission::Pending(handle) => {
                assert_eq!(handle.handle, "req-42");
                assert_eq!(handle.queue_position, Some(7));
            }
            Submission::Completed(_) => panic!("queue adapter returned a sync result"),
        }
    }

    #[tokio::test]
    async fn poll_reports_queue_position_while_queued() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/queue/generations/req-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "queued",
                "queue_position": 3,
            })))
            .mount(&server)
            .await;

        let client = FluxQueueClient::new(server.uri(), "fq-key");
        let outcome = client.poll("req-42").await.unwrap();
        assert_eq!(outcome.state, PollState::Queued);
        assert_eq!(outcome.queue_position, Some(3));
    }

    #[tokio::test]
    async fn poll_surfaces_completed_outputs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/queue/generations/req-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "completed",
                "outputs": ["https://out.fluxqueue.example/1.png"],
            })))
            .mount(&server)
            .await;

        let client = FluxQueueClient::new(server.uri(), "fq-key");
        let outcome = client.poll("req-42").await.unwrap();
        assert_eq!(outcome.state, PollState::Completed);
        assert_eq!(outcome.urls, vec!["https://out.fluxqueue.example/1.png"]);
    }

    #[tokio::test]
    async fn blocked_status_is_a_content_policy_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/queue/generations/req-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "blocked",
                "error": "nsfw content detected",
            })))
            .mount(&server)
            .await;

        let client = FluxQueueClient::new(server.uri(), "fq-key");
        let outcome = client.poll("req-42").await.unwrap();
        assert_eq!(outcome.state, PollState::Failed);
        assert!(outcome.error.unwrap().contains("content policy"));
    }

    #[tokio::test]
    async fn validation_rejection_maps_to_invalid_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/queue/generations"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "detail": "num_outputs must be between 1 and 4"
            })))
            .mount(&server)
            .await;

        let client = FluxQueueClient::new(server.uri(), "fq-key");
        let err = client.submit(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidParameters(_)));
    }
}
