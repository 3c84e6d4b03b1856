//! Shared value types for the reviewfix workspace.
//!
//! # Design constraints
//! - Findings are read-only inputs; nothing in the workspace mutates one after normalization.
//! - An [`plan::EditPlan`] is built once per run and consumed once by the applier.
//! - A [`buffer::SourceBuffer`] is never mutated in place; applying a plan yields a new buffer.
//! - The run summary is serialized to disk and read by other tools, so prefer adding optional
//!   fields over changing semantics.

pub mod buffer;
pub mod finding;
pub mod plan;
pub mod summary;

pub use buffer::{LineEnding, SourceBuffer, split_lines};
pub use finding::{Finding, FindingId, LineRange};
pub use plan::{Edit, EditPlan, PlanViolation, Replacement};
pub use summary::{
    AbortInfo, AbortKind, FindingOutcome, FindingStatus, RunState, RunSummary, SummaryCounts,
    ToolInfo,
};

/// Schema identifiers.
pub mod schema {
    pub const REVIEWFIX_SUMMARY_V1: &str = "reviewfix.summary.v1";
    pub const REVIEWFIX_PLAN_V1: &str = "reviewfix.plan.v1";
}
