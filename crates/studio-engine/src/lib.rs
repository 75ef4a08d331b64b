//! Generation orchestration: the reserve → submit → settle core.
//!
//! [`Orchestrator`] drives each generation through pricing, reservation,
//! provider submission and settlement, guaranteeing that every reservation
//! is committed or released exactly once. [`Reconciler`] resolves
//! asynchronous provider jobs to a terminal state on a timer. [`AssetSink`]
//! is the boundary where provider-ephemeral outputs become durable URLs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod assets;
pub mod orchestrator;
pub mod reconciler;

pub use assets::{AssetSink, AssetSinkError, HttpAssetSink, InMemoryAssetSink};
pub use orchestrator::{EngineSettings, GenerationOutcome, JobView, Orchestrator};
pub use reconciler::Reconciler;
