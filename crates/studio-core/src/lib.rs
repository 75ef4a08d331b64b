//! Core types for the Design Studio generation platform.
//!
//! This crate provides the foundational types used throughout the studio
//! backend:
//!
//! - **Identifiers**: `UserId`, `JobId`, `AssetId`
//! - **Ledger**: `TicketLedger`, `BalanceSnapshot`
//! - **Jobs**: `GenerationJob`, `JobStatus`, `ModelType`
//! - **Assets**: `GeneratedAsset`
//! - **Requests**: `GenerationParams`, `GenerationRequest`
//! - **Pricing**: `PricingTable`
//!
//! # Ticket unit
//!
//! **1 ticket = 1 purchased generation credit.**
//!
//! Tickets are stored as `i64` and only ever change through the ledger
//! operations reserve/commit/release/grant. A reservation is a provisional
//! hold taken before any provider call; settlement either commits it
//! (success) or releases it (failure), exactly once.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod asset;
pub mod error;
pub mod ids;
pub mod job;
pub mod ledger;
pub mod params;
pub mod pricing;

pub use asset::{GeneratedAsset, ASSET_RETENTION_DAYS};
pub use error::{Result, StudioError};
pub use ids::{AssetId, IdError, JobId, UserId};
pub use job::{truncate_error, GenerationJob, JobStatus, ModelType, ERROR_MESSAGE_MAX_CHARS};
pub use ledger::{BalanceSnapshot, TicketLedger};
pub use params::{GenerationParams, GenerationRequest, Quality, Resolution};
pub use pricing::{
    ImagePricing, PricingTable, VideoPricing, MAX_IMAGE_OUTPUTS, MAX_VIDEO_DURATION_SECONDS,
};
