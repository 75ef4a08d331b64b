//! Studio Client SDK.
//!
//! This crate provides a client library for frontends and services to
//! interact with the studio generation API.
//!
//! # Example
//!
//! ```no_run
//! use studio_client::{GenerateRequest, StudioClient};
//! use studio_core::GenerationParams;
//!
//! # async fn example() -> Result<(), studio_client::ClientError> {
//! let client = StudioClient::new(
//!     "http://studio-service.studio.svc:8080",
//!     "your-jwt-token",
//! )?;
//!
//! // Start a generation
//! let response = client.generate(&GenerateRequest {
//!     model_id: "lumina-image-1".to_string(),
//!     prompt: "a quiet harbor at dawn".to_string(),
//!     params: GenerationParams::default(),
//! }).await?;
//!
//! println!("Job {} is {:?}", response.job.id, response.job.status);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, StudioClient};
pub use error::ClientError;
pub use types::{
    EstimateResponse, GenerateRequest, GenerationResponse, JobListResponse, JobStatusResponse,
};
