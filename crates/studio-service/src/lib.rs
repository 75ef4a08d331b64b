//! Design Studio HTTP API Service.
//!
//! This crate provides the HTTP API for the studio generation platform,
//! including:
//!
//! - Ticket ledger provisioning, balances and admin grants
//! - Generation submission, cost estimates and status polling
//! - Active/recent job listings for reload recovery
//!
//! # Authentication
//!
//! The service supports two authentication methods:
//!
//! 1. **JWT tokens** - For end-user requests (the studio frontend)
//! 2. **Admin API key** - For privileged requests (ticket grants)

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for consistency

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::{build_registry, AppState};
