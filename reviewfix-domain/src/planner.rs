use crate::paths::paths_match;
use camino::{Utf8Path, Utf8PathBuf};
use reviewfix_types::{
    Edit, EditPlan, Finding, FindingId, LineRange, PlanViolation, Replacement, SourceBuffer,
    split_lines,
};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a finding's range cannot be used against the current artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum InvalidRangeError {
    #[error("zero-line: lines are 1-based, got {start}..{end}")]
    ZeroLine { start: usize, end: usize },

    #[error("inverted: start line {start} is after end line {end}")]
    Inverted { start: usize, end: usize },

    #[error("out-of-bounds: end line {end} exceeds artifact line count {line_count}")]
    OutOfBounds { end: usize, line_count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeRejection {
    /// Position of the finding in the input list.
    pub position: usize,
    pub finding_id: FindingId,
    pub range: LineRange,
    pub error: InvalidRangeError,
}

/// Two findings overlapped; the later-sorted one was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictWarning {
    pub dropped: FindingId,
    pub dropped_position: usize,
    pub dropped_range: LineRange,
    pub kept: FindingId,
    pub kept_position: usize,
    pub kept_range: LineRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("no valid findings remain for {target}: all {} were rejected", .rejections.len())]
    NoValidFindings {
        target: Utf8PathBuf,
        rejections: Vec<RangeRejection>,
    },

    #[error("planner produced an invalid plan: {0}")]
    Violation(#[from] PlanViolation),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlanOutcome {
    pub plan: EditPlan,
    pub conflicts: Vec<ConflictWarning>,
    pub rejections: Vec<RangeRejection>,
    /// Findings addressed to other artifacts; ignored, not errors.
    pub other_artifact: Vec<FindingId>,
    /// Input position of the finding behind each plan edit, in plan order.
    pub edit_positions: Vec<usize>,
}

pub fn validate_range(range: LineRange, line_count: usize) -> Result<(), InvalidRangeError> {
    let LineRange { start, end } = range;
    if start == 0 || end == 0 {
        return Err(InvalidRangeError::ZeroLine { start, end });
    }
    if start > end {
        return Err(InvalidRangeError::Inverted { start, end });
    }
    if end > line_count {
        return Err(InvalidRangeError::OutOfBounds { end, line_count });
    }
    Ok(())
}

/// Plans edits for one target artifact.
#[derive(Debug, Clone)]
pub struct PatchPlanner {
    target: Utf8PathBuf,
}

impl PatchPlanner {
    pub fn new(target: impl Into<Utf8PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &Utf8Path {
        &self.target
    }

    /// Turn `findings` into an ordered, non-overlapping plan.
    ///
    /// Invalid ranges are rejected per finding and overlaps are dropped by the dominance rule;
    /// neither fails the call. Planning fails only when findings target this artifact and every
    /// one of them was rejected.
    pub fn plan(&self, findings: &[Finding], line_count: usize) -> Result<PlanOutcome, PlanError> {
        self.plan_admitting(findings, line_count, &BTreeSet::new())
    }

    /// Like [`PatchPlanner::plan`], but against the artifact's content.
    ///
    /// A previous run that shrank the end of the artifact leaves findings whose end line is past
    /// the new end. When every such finding's fix, and every other length change of the plan,
    /// already sits where that run put it, those findings are planned instead of rejected and
    /// the applier reports them as already present.
    pub fn plan_buffer(
        &self,
        findings: &[Finding],
        buffer: &SourceBuffer,
    ) -> Result<PlanOutcome, PlanError> {
        let line_count = buffer.line_count();
        let stale: BTreeSet<usize> = findings
            .iter()
            .enumerate()
            .filter(|(_, f)| {
                paths_match(&f.file_path, &self.target) && past_end_resize(f, line_count)
            })
            .map(|(position, _)| position)
            .collect();

        if !stale.is_empty()
            && let Ok(outcome) = self.plan_admitting(findings, line_count, &stale)
            && outcome.plan.matches_applied(buffer)
        {
            debug!(
                target = %self.target,
                admitted = stale.len(),
                "findings past the end match a previous run's output"
            );
            return Ok(outcome);
        }
        self.plan_admitting(findings, line_count, &BTreeSet::new())
    }

    /// Plan, skipping the bounds check for the findings at `admitted` positions.
    fn plan_admitting(
        &self,
        findings: &[Finding],
        line_count: usize,
        admitted: &BTreeSet<usize>,
    ) -> Result<PlanOutcome, PlanError> {
        let mut outcome = PlanOutcome::default();

        let mut candidates: Vec<(usize, &Finding)> = Vec::new();
        let mut targeted = 0usize;
        for (position, f) in findings.iter().enumerate() {
            if !paths_match(&f.file_path, &self.target) {
                outcome.other_artifact.push(f.id.clone());
                continue;
            }
            targeted += 1;

            let bound = if admitted.contains(&position) {
                usize::MAX
            } else {
                line_count
            };
            if let Err(error) = validate_range(f.range(), bound) {
                debug!(finding_id = %f.id, range = %f.range(), %error, "rejecting finding");
                outcome.rejections.push(RangeRejection {
                    position,
                    finding_id: f.id.clone(),
                    range: f.range(),
                    error,
                });
                continue;
            }
            candidates.push((position, f));
        }

        if targeted > 0 && candidates.is_empty() {
            return Err(PlanError::NoValidFindings {
                target: self.target.clone(),
                rejections: outcome.rejections,
            });
        }

        // Deterministic ordering: start ascending, widest first on ties, then input order.
        candidates.sort_by_key(|(position, f)| (f.start_line, Reverse(f.end_line), *position));

        let mut edits: Vec<Edit> = Vec::with_capacity(candidates.len());
        for (position, f) in candidates {
            let range = f.range();
            if let Some(prev) = edits.last()
                && prev.range.overlaps(&range)
            {
                warn!(
                    dropped = %f.id,
                    kept = %prev.source_finding_id,
                    range = %range,
                    "overlapping findings; keeping the dominant one"
                );
                let kept_position = outcome.edit_positions.last().copied().unwrap_or_default();
                outcome.conflicts.push(ConflictWarning {
                    dropped: f.id.clone(),
                    dropped_position: position,
                    dropped_range: range,
                    kept: prev.source_finding_id.clone(),
                    kept_position,
                    kept_range: prev.range,
                });
                continue;
            }

            edits.push(Edit {
                range,
                replacement: replacement_for(f),
                source_finding_id: f.id.clone(),
            });
            outcome.edit_positions.push(position);
        }

        outcome.plan = EditPlan::from_edits(edits)?;
        debug!(
            target = %self.target,
            edits = outcome.plan.len(),
            pending = outcome.plan.pending_ids().len(),
            conflicts = outcome.conflicts.len(),
            rejections = outcome.rejections.len(),
            "planned"
        );
        Ok(outcome)
    }
}

/// A literal fix that changes the line count of a range ending past `line_count`.
fn past_end_resize(f: &Finding, line_count: usize) -> bool {
    let range = f.range();
    if range.start == 0 || range.start > range.end || range.end <= line_count {
        return false;
    }
    match replacement_for(f) {
        Replacement::Literal(text) => split_lines(&text).len() != range.len(),
        Replacement::Pending | Replacement::Keep => false,
    }
}

fn replacement_for(f: &Finding) -> Replacement {
    match &f.suggested_fix {
        Some(text) if !text.trim().is_empty() => Replacement::Literal(text.clone()),
        Some(_) => Replacement::Keep,
        None => Replacement::Pending,
    }
}
