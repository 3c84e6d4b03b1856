//! Edit engine for reviewfix plans.
//!
//! Responsibilities:
//! - Apply a resolved [`EditPlan`] to a [`SourceBuffer`], bottom-up, all or nothing.
//! - Recognize a buffer that already carries the plan's length changes so re-runs are no-ops.
//! - Generate a unified diff preview and content hashes for the run summary.

mod error;

pub use error::{EditError, EditResult};

use diffy::PatchFormatter;
use reviewfix_types::{EditPlan, FindingId, LineRange, Replacement, SourceBuffer, split_lines};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

/// What happened to one edit of the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEdit {
    pub finding_id: FindingId,
    /// Range as planned, in the coordinates of the findings.
    pub range: LineRange,
    /// Whether this edit changed any line.
    pub changed: bool,
    /// The replacement was found in place already and the edit was skipped.
    pub already_present: bool,
    /// Lines taken out and put in by this edit; both zero when unchanged.
    pub removed: usize,
    pub inserted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub buffer: SourceBuffer,
    /// True iff the new buffer's content differs from the input's.
    pub changed: bool,
    /// One entry per plan edit, in plan order.
    pub edits: Vec<AppliedEdit>,
}

/// Where an edit lands in the buffer being patched.
struct Placement {
    range: LineRange,
    lines: Option<Vec<String>>,
    already_present: bool,
}

/// Apply `plan` to `buffer`.
///
/// Edits are spliced in descending start order so earlier line numbers stay valid.
///
/// When the buffer reads like the output of this same plan (see
/// [`EditPlan::matches_applied`]), every length-changing literal is reported as
/// `already_present` and skipped, and the remaining edits are placed after the shifts those
/// skipped edits made. Re-running a plan on its own output is then a no-op. The check cannot
/// tell a rerun from a first run whose fix text already surrounds its range: a shrink whose
/// replacement is the first lines of the range, or a growth whose replacement is the range
/// followed by the lines after it. Such a first run is skipped the same way, and callers see it
/// through `already_present`.
///
/// The plan must be fully resolved. Any failure leaves no partial result behind.
pub fn apply_plan(buffer: &SourceBuffer, plan: EditPlan) -> EditResult<ApplyOutcome> {
    if let Some(id) = plan.pending_ids().into_iter().next() {
        return Err(EditError::Unresolved { id });
    }

    let placements = place_edits(buffer, &plan)?;
    let mut lines = buffer.lines().to_vec();
    let mut edits: Vec<AppliedEdit> = Vec::with_capacity(plan.len());

    for (edit, placement) in plan.edits().iter().zip(&placements).rev() {
        let (removed, inserted) = match &placement.lines {
            Some(new_lines) if !placement.already_present => {
                let idx = placement.range.to_index_range();
                if lines[idx.clone()] == new_lines[..] {
                    (0, 0)
                } else {
                    let removed = idx.len();
                    lines.splice(idx, new_lines.iter().cloned());
                    (removed, new_lines.len())
                }
            }
            _ => (0, 0),
        };
        let changed = removed > 0 || inserted > 0;
        trace!(
            finding_id = %edit.source_finding_id,
            range = %placement.range,
            changed,
            already_present = placement.already_present,
            "edit"
        );
        edits.push(AppliedEdit {
            finding_id: edit.source_finding_id.clone(),
            range: edit.range,
            changed,
            already_present: placement.already_present,
            removed,
            inserted,
        });
    }
    edits.reverse();

    let changed = lines.as_slice() != buffer.lines();
    debug!(
        edits = edits.len(),
        changed,
        lines_before = buffer.line_count(),
        lines_after = lines.len(),
        "applied plan"
    );
    Ok(ApplyOutcome {
        buffer: buffer.with_lines(lines),
        changed,
        edits,
    })
}

/// Map each edit to its position in `buffer`, in plan order.
fn place_edits(buffer: &SourceBuffer, plan: &EditPlan) -> EditResult<Vec<Placement>> {
    let all = buffer.lines();
    let line_count = all.len();
    let rerun = plan.matches_applied(buffer);
    if rerun {
        debug!(edits = plan.len(), "buffer already carries this plan's length changes");
    }
    let mut offset: isize = 0;
    let mut out = Vec::with_capacity(plan.len());

    for edit in plan.edits() {
        let out_of_bounds = || EditError::RangeOutOfBounds {
            id: edit.source_finding_id.clone(),
            range: edit.range,
            line_count,
        };
        let start = edit
            .range
            .start
            .checked_add_signed(offset)
            .filter(|s| *s >= 1)
            .ok_or_else(out_of_bounds)?;
        let range = LineRange::new(start, start + edit.range.len() - 1);

        let placement = match &edit.replacement {
            Replacement::Literal(text) => {
                let new_lines = split_lines(text);
                let already_present = rerun && new_lines.len() != edit.range.len();
                if already_present {
                    offset += new_lines.len() as isize - edit.range.len() as isize;
                } else if range.end > line_count {
                    return Err(out_of_bounds());
                }
                Placement {
                    range,
                    lines: Some(new_lines),
                    already_present,
                }
            }
            Replacement::Keep if range.end > line_count => return Err(out_of_bounds()),
            Replacement::Keep => Placement {
                range,
                lines: None,
                already_present: false,
            },
            Replacement::Pending => {
                return Err(EditError::Unresolved {
                    id: edit.source_finding_id.clone(),
                });
            }
        };
        out.push(placement);
    }
    Ok(out)
}

/// Unified diff between two versions of one artifact; empty when they are equal.
pub fn render_patch(path: &str, before: &str, after: &str) -> String {
    if before == after {
        return String::new();
    }
    let mut out = String::new();
    out.push_str(&format!("diff --git a/{0} b/{0}\n", path));
    out.push_str(&format!("--- a/{0}\n+++ b/{0}\n", path));

    let patch = diffy::create_patch(before, after);
    let formatter = PatchFormatter::new();
    let body = formatter.fmt_patch(&patch).to_string();
    // diffy repeats the ---/+++ header; keep ours with the real path.
    let hunks = body
        .split_once("\n@@")
        .map(|(_, rest)| format!("@@{rest}"))
        .unwrap_or_default();
    out.push_str(&hunks);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reviewfix_types::Edit;

    fn edit(id: &str, start: usize, end: usize, r: Replacement) -> Edit {
        Edit {
            range: LineRange::new(start, end),
            replacement: r,
            source_finding_id: FindingId::from(id),
        }
    }

    fn lit(s: &str) -> Replacement {
        Replacement::Literal(s.to_string())
    }

    fn buffer(n: usize) -> SourceBuffer {
        SourceBuffer::from_lines((1..=n).map(|i| format!("line {i}")).collect())
    }

    #[test]
    fn bottom_up_application_keeps_positions() {
        let buf = buffer(10);
        let plan = EditPlan::from_edits(vec![
            edit("a", 2, 3, lit("X")),
            edit("b", 7, 7, lit("Y1\nY2")),
        ])
        .unwrap();

        let out = apply_plan(&buf, plan).unwrap();
        assert!(out.changed);
        assert_eq!(out.buffer.line_count(), 10);
        assert_eq!(out.buffer.line(2), Some("X"));
        assert_eq!(out.buffer.line(3), Some("line 4"));
        assert_eq!(out.buffer.line(6), Some("Y1"));
        assert_eq!(out.buffer.line(7), Some("Y2"));
        assert_eq!(out.buffer.line(8), Some("line 8"));
    }

    #[test]
    fn identical_replacement_is_a_no_op() {
        let buf = buffer(5);
        let plan = EditPlan::from_edits(vec![edit("same", 3, 3, lit("line 3"))]).unwrap();
        let out = apply_plan(&buf, plan).unwrap();
        assert!(!out.changed);
        assert!(!out.edits[0].changed);
        assert_eq!(out.buffer, buf);
    }

    #[test]
    fn keep_leaves_range_untouched() {
        let buf = buffer(5);
        let plan = EditPlan::from_edits(vec![edit("k", 5, 5, Replacement::Keep)]).unwrap();
        let out = apply_plan(&buf, plan).unwrap();
        assert!(!out.changed);
        assert_eq!(out.buffer.to_text(), buf.to_text());
    }

    #[test]
    fn pending_edit_is_refused() {
        let buf = buffer(5);
        let plan = EditPlan::from_edits(vec![edit("p", 1, 1, Replacement::Pending)]).unwrap();
        let err = apply_plan(&buf, plan).unwrap_err();
        assert_eq!(
            err,
            EditError::Unresolved {
                id: FindingId::from("p")
            }
        );
    }

    #[test]
    fn range_past_end_is_refused() {
        let buf = buffer(3);
        let plan = EditPlan::from_edits(vec![edit("far", 3, 4, lit("x"))]).unwrap();
        assert!(matches!(
            apply_plan(&buf, plan),
            Err(EditError::RangeOutOfBounds { line_count: 3, .. })
        ));
    }

    #[test]
    fn second_run_with_shrinking_fix_is_a_no_op() {
        let buf = buffer(10);
        let plan = || {
            EditPlan::from_edits(vec![
                edit("a", 2, 3, lit("X")),
                edit("b", 7, 7, lit("Z")),
            ])
            .unwrap()
        };

        let first = apply_plan(&buf, plan()).unwrap();
        assert!(first.changed);

        let second = apply_plan(&first.buffer, plan()).unwrap();
        assert!(!second.changed);
        assert!(second.edits[0].already_present);
        assert_eq!(second.buffer, first.buffer);
    }

    #[test]
    fn shrunk_tail_is_recognized_on_rerun() {
        let buf = buffer(4);
        let plan = || EditPlan::from_edits(vec![edit("tail", 3, 4, lit("end"))]).unwrap();
        let first = apply_plan(&buf, plan()).unwrap();
        assert_eq!(first.buffer.line_count(), 3);

        let second = apply_plan(&first.buffer, plan()).unwrap();
        assert!(!second.changed);
        assert!(second.edits[0].already_present);
    }

    #[test]
    fn shrink_onto_own_prefix_reports_already_present() {
        let buf = SourceBuffer::from_text("a\nclose(s);\nclose(s);\nb\n");
        let plan = EditPlan::from_edits(vec![edit("dup", 2, 3, lit("close(s);"))]).unwrap();
        let out = apply_plan(&buf, plan).unwrap();
        assert!(out.edits[0].already_present);
        assert!(!out.edits[0].changed);
        assert!(!out.changed);
        assert_eq!(out.buffer, buf);
    }

    #[test]
    fn growth_onto_following_lines_reports_already_present() {
        let buf = SourceBuffer::from_text("if (x) {\n  if (y) {\n}\n");
        let plan = EditPlan::from_edits(vec![edit("brace", 2, 2, lit("  if (y) {\n}"))]).unwrap();
        let out = apply_plan(&buf, plan).unwrap();
        assert!(out.edits[0].already_present);
        assert!(!out.edits[0].changed);
        assert_eq!(out.buffer.to_text(), "if (x) {\n  if (y) {\n}\n");
    }

    #[test]
    fn partial_match_applies_every_edit_at_planned_lines() {
        // The first fix matches its own prefix, the second does not: the buffer is fresh.
        let buf = SourceBuffer::from_text("a\nx\nx\nb\nc\nd\n");
        let plan = EditPlan::from_edits(vec![
            edit("prefix", 2, 3, lit("x")),
            edit("later", 5, 5, lit("C1\nC2")),
        ])
        .unwrap();
        let out = apply_plan(&buf, plan).unwrap();
        assert!(out.edits.iter().all(|e| !e.already_present));
        assert_eq!(out.buffer.to_text(), "a\nx\nb\nC1\nC2\nd\n");
    }

    #[test]
    fn preserves_crlf_and_missing_trailing_newline() {
        let buf = SourceBuffer::from_text("a\r\nb\r\nc");
        let plan = EditPlan::from_edits(vec![edit("b", 2, 2, lit("B"))]).unwrap();
        let out = apply_plan(&buf, plan).unwrap();
        assert_eq!(out.buffer.to_text(), "a\r\nB\r\nc");
    }

    #[test]
    fn render_patch_is_empty_for_equal_text() {
        assert_eq!(render_patch("a.txt", "x\n", "x\n"), "");
    }

    #[test]
    fn render_patch_names_the_artifact() {
        let patch = render_patch("src/a.txt", "a\nb\n", "a\nB\n");
        assert!(patch.starts_with("diff --git a/src/a.txt b/src/a.txt\n"));
        assert!(patch.contains("-b\n"));
        assert!(patch.contains("+B\n"));
    }

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
