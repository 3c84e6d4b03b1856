//! Domain logic: turn findings into a deterministic edit plan.
//!
//! This crate owns *which* edits are made and why others are dropped. It does not own *how*
//! edits are applied; that's the `reviewfix-edit` crate.

mod paths;
mod planner;

pub use paths::{normalize_path, paths_match};
pub use planner::{
    ConflictWarning, InvalidRangeError, PatchPlanner, PlanError, PlanOutcome, RangeRejection,
    validate_range,
};
