//! Studio API client implementation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use studio_core::{BalanceSnapshot, GenerationJob, GenerationParams, JobId};

use crate::error::ClientError;
use crate::types::{
    ErrorEnvelope, EstimateResponse, GenerateRequest, GenerationResponse, JobListResponse,
    JobStatusResponse,
};

/// Options for constructing a [`StudioClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout. Generations against synchronous models block for
    /// tens of seconds, so this defaults generously to 150 seconds.
    pub timeout: Duration,
    /// Admin API key for privileged calls (ticket grants).
    pub admin_api_key: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(150),
            admin_api_key: None,
        }
    }
}

/// Client for the studio generation API.
#[derive(Debug, Clone)]
pub struct StudioClient {
    client: Client,
    base_url: String,
    auth_token: String,
    admin_api_key: Option<String>,
}

impl StudioClient {
    /// Create a new client with default options.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be
    /// built or `base_url` is empty.
    pub fn new(
        base_url: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Self::with_options(base_url, auth_token, ClientOptions::default())
    }

    /// Create a new client with explicit options.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be
    /// built or `base_url` is empty.
    pub fn with_options(
        base_url: impl Into<String>,
        auth_token: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ClientError::Configuration("base_url is empty".into()));
        }

        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            auth_token: auth_token.into(),
            admin_api_key: options.admin_api_key,
        })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Authorization", format!("Bearer {}", self.auth_token))
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        if response.status().is_success() {
            return Ok(response.json::<T>().await?);
        }

        let status = response.status().as_u16();
        match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => {
                if envelope.error.code == "insufficient_tickets" {
                    if let Some(details) = &envelope.error.details {
                        let available = details.get("available").and_then(serde_json::Value::as_i64);
                        let required = details.get("required").and_then(serde_json::Value::as_i64);
                        if let (Some(available), Some(required)) = (available, required) {
                            return Err(ClientError::InsufficientTickets {
                                available,
                                required,
                            });
                        }
                    }
                }
                Err(ClientError::Api {
                    code: envelope.error.code,
                    message: envelope.error.message,
                    status,
                })
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status,
            }),
        }
    }

    // ===== Tickets =====

    /// Create a zero-balance ticket ledger for the authenticated user.
    ///
    /// Idempotent: returns the current figures when the ledger exists.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] on transport failure or an API error.
    pub async fn provision(&self) -> Result<BalanceSnapshot, ClientError> {
        let url = format!("{}/v1/tickets/provision", self.base_url);
        let response = self.authed(self.client.post(&url)).send().await?;
        Self::handle_response(response).await
    }

    /// Get the authenticated user's balance figures.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] on transport failure or an API error.
    pub async fn balance(&self) -> Result<BalanceSnapshot, ClientError> {
        let url = format!("{}/v1/tickets/balance", self.base_url);
        let response = self.authed(self.client.get(&url)).send().await?;
        Self::handle_response(response).await
    }

    /// Add tickets to a user's balance. Requires an admin API key.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` when no admin key was set, or
    /// a [`ClientError`] on transport failure or an API error.
    pub async fn grant(&self, user_id: &str, amount: i64) -> Result<BalanceSnapshot, ClientError> {
        let admin_key = self
            .admin_api_key
            .as_ref()
            .ok_or_else(|| ClientError::Configuration("admin API key not configured".into()))?;

        let url = format!("{}/v1/tickets/grant", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("X-Admin-Key", admin_key)
            .json(&serde_json::json!({ "user_id": user_id, "amount": amount }))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    // ===== Generations =====

    /// Price a generation without starting it.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] on transport failure or an API error.
    pub async fn estimate(
        &self,
        model_id: &str,
        params: &GenerationParams,
    ) -> Result<EstimateResponse, ClientError> {
        let url = format!("{}/v1/generations/estimate", self.base_url);
        let response = self
            .authed(self.client.post(&url))
            .json(&serde_json::json!({ "model_id": model_id, "params": params }))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Start a generation.
    ///
    /// Synchronous models return a completed job with assets inline;
    /// asynchronous models return a queued job whose id should be polled
    /// via [`StudioClient::job_status`].
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InsufficientTickets` when the hold does not
    /// fit, or another [`ClientError`] on transport or API failure.
    pub async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<GenerationResponse, ClientError> {
        let url = format!("{}/v1/generations", self.base_url);
        let response = self
            .authed(self.client.post(&url))
            .json(request)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Fetch one job with its assets.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] on transport failure or an API error.
    pub async fn job_status(&self, job_id: &JobId) -> Result<JobStatusResponse, ClientError> {
        let url = format!("{}/v1/generations/{job_id}", self.base_url);
        let response = self.authed(self.client.get(&url)).send().await?;
        Self::handle_response(response).await
    }

    /// List the user's non-terminal jobs, oldest first.
    ///
    /// Call this after a reload to reattach to in-flight generations.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] on transport failure or an API error.
    pub async fn active_jobs(&self) -> Result<Vec<GenerationJob>, ClientError> {
        let url = format!("{}/v1/generations/active", self.base_url);
        let response = self.authed(self.client.get(&url)).send().await?;
        Self::handle_response::<JobListResponse>(response)
            .await
            .map(|r| r.jobs)
    }

    /// List the user's terminal jobs, newest first.
    ///
    /// When `since` is `None` the server applies its default window.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] on transport failure or an API error.
    pub async fn recent_jobs(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<GenerationJob>, ClientError> {
        let url = format!("{}/v1/generations/recent", self.base_url);
        let mut builder = self.authed(self.client.get(&url));
        if let Some(since) = since {
            builder = builder.query(&[("since", since.to_rfc3339())]);
        }
        let response = builder.send().await?;
        Self::handle_response::<JobListResponse>(response)
            .await
            .map(|r| r.jobs)
    }
}
