//! Correction oracle for reviewfix.
//!
//! An [`OracleClient`] is an explicit value built once and handed to each pipeline run. It
//! batches every finding that lacks a literal fix into one prompt, retries transient failures
//! with exponential backoff, and parses replies tolerantly. The network sits behind
//! [`OracleTransport`] so pipelines can run against [`fakes::ScriptedTransport`].

mod budget;
mod client;
mod config;
mod error;
pub mod fakes;
mod parse;
mod prompt;
mod transport;

pub use budget::OracleBudget;
pub use client::{NO_CORRECTION, OracleClient, Proposals};
pub use config::{
    BackoffConfig, DEFAULT_API_KEY_ENV, DEFAULT_MODEL_ID, DEFAULT_REGION, OracleConfig,
};
pub use error::{OracleError, classify_status};
pub use parse::parse_corrections;
pub use prompt::build_prompt;
pub use transport::{HttpTransport, OracleRequest, OracleTransport};
