//! Embeddable core library for reviewfix.
//!
//! Provides a clap-free, I/O-abstracted entry point: an explicit per-artifact state machine
//! ([`orchestrator::Orchestrator`]) and batch helpers around it ([`pipeline`]).
//!
//! # Port traits
//!
//! All I/O is abstracted behind port traits in [`ports`]:
//! - [`FindingSource`](ports::FindingSource) loads normalized findings
//! - [`ArtifactStore`](ports::ArtifactStore) reads artifacts and replaces them atomically
//!
//! The [`adapters`] module provides filesystem-backed and in-memory implementations.
//!
//! # Entry points
//!
//! - [`run_batch`](pipeline::run_batch) runs the full pipeline over every selected artifact
//! - [`plan_artifact`](pipeline::plan_artifact) plans one artifact without calling the oracle

pub mod adapters;
pub mod cancel;
pub mod orchestrator;
pub mod pipeline;
pub mod ports;
pub mod settings;
pub mod verify;

pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use orchestrator::{Orchestrator, RunOutcome};
pub use pipeline::{BatchOutcome, PlanReport, plan_artifact, run_batch, run_many, write_reports};

// Re-export so embedders don't need the oracle crate directly for the common case.
pub use reviewfix_oracle::{OracleBudget, OracleClient, OracleConfig};
