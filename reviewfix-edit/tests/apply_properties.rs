//! Property-based tests for the patch applier.
//!
//! These tests verify that:
//! - Lines before the first edit and after the last edit are untouched
//! - The line count moves by exactly the replaced-minus-inserted delta
//! - Applying the same plan to its own output is a no-op
//! - `changed` reports whether the content actually differs
//! - With fix text taken from the artifact itself, a run either splices every edit at its
//!   planned lines or reports the length-changing ones as already present

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use reviewfix_domain::PatchPlanner;
use reviewfix_edit::apply_plan;
use reviewfix_types::{
    Edit, EditPlan, Finding, FindingId, LineRange, Replacement, SourceBuffer, split_lines,
};

const LINES: usize = 30;

fn source() -> SourceBuffer {
    SourceBuffer::from_lines((1..=LINES).map(|i| format!("orig {i}")).collect())
}

/// (gap before edit, range length, replacement line count; 0 means Keep)
fn arb_plan() -> impl Strategy<Value = EditPlan> {
    prop::collection::vec((0usize..4, 1usize..4, 0usize..4), 0..8).prop_map(|specs| {
        let mut edits = Vec::new();
        let mut next = 1usize;
        for (i, (gap, len, k)) in specs.into_iter().enumerate() {
            let start = next + gap;
            let end = start + len - 1;
            if end > LINES {
                break;
            }
            let replacement = if k == 0 {
                Replacement::Keep
            } else {
                let text: Vec<String> = (0..k).map(|j| format!("fix {i} {j}")).collect();
                Replacement::Literal(text.join("\n"))
            };
            edits.push(Edit {
                range: LineRange::new(start, end),
                replacement,
                source_finding_id: FindingId::new(format!("e{i}")),
            });
            next = end + 1;
        }
        EditPlan::from_edits(edits).expect("generated plan is valid")
    })
}

/// Like [`arb_plan`], but fix lines are copied from the source: either the lines the range
/// starts with (a fix that may already look applied) or a run from anywhere else.
/// (gap, range length, fix line count, copy from the range itself, copy origin)
fn arb_source_drawn_plan() -> impl Strategy<Value = EditPlan> {
    prop::collection::vec(
        (0usize..4, 1usize..4, 1usize..4, any::<bool>(), 0usize..LINES),
        0..6,
    )
    .prop_map(|specs| {
        let src = source();
        let mut edits = Vec::new();
        let mut next = 1usize;
        for (i, (gap, len, k, from_range, origin)) in specs.into_iter().enumerate() {
            let start = next + gap;
            let end = start + len - 1;
            if end > LINES {
                break;
            }
            let from = if from_range { start - 1 } else { origin };
            let copied = &src.lines()[from..(from + k).min(LINES)];
            edits.push(Edit {
                range: LineRange::new(start, end),
                replacement: Replacement::Literal(copied.join("\n")),
                source_finding_id: FindingId::new(format!("e{i}")),
            });
            next = end + 1;
        }
        EditPlan::from_edits(edits).expect("generated plan is valid")
    })
}

/// Splice every literal at its planned lines, last edit first.
fn plain_splice(buf: &SourceBuffer, plan: &EditPlan) -> Vec<String> {
    let mut lines = buf.lines().to_vec();
    for e in plan.edits().iter().rev() {
        if let Replacement::Literal(text) = &e.replacement {
            lines.splice(e.range.to_index_range(), split_lines(text));
        }
    }
    lines
}

/// Splice only the same-length literals, each moved by the deltas of the length-changing
/// literals before it, as if those were already in place.
fn splice_over_applied(buf: &SourceBuffer, plan: &EditPlan) -> Vec<String> {
    let mut lines = buf.lines().to_vec();
    let mut shift: isize = 0;
    for e in plan.edits() {
        let Replacement::Literal(text) = &e.replacement else {
            continue;
        };
        let new_lines = split_lines(text);
        if new_lines.len() == e.range.len() {
            let at = (e.range.start as isize + shift - 1) as usize;
            lines.splice(at..at + new_lines.len(), new_lines);
        } else {
            shift += new_lines.len() as isize - e.range.len() as isize;
        }
    }
    lines
}

proptest! {
    #[test]
    fn untouched_margins_and_exact_delta(plan in arb_plan()) {
        let buf = source();
        let first_start = plan.edits().first().map(|e| e.range.start);
        let last_end = plan.edits().last().map(|e| e.range.end);

        let mut expected_len = LINES as isize;
        for e in plan.edits() {
            if let Replacement::Literal(text) = &e.replacement {
                expected_len += text.lines().count() as isize - e.range.len() as isize;
            }
        }

        let out = apply_plan(&buf, plan).unwrap();
        let after = out.buffer.lines();
        prop_assert_eq!(after.len() as isize, expected_len);

        if let (Some(first), Some(last)) = (first_start, last_end) {
            prop_assert_eq!(&after[..first - 1], &buf.lines()[..first - 1]);
            let tail = LINES - last;
            prop_assert_eq!(&after[after.len() - tail..], &buf.lines()[last..]);
        } else {
            prop_assert_eq!(after, buf.lines());
        }
    }

    #[test]
    fn applying_twice_is_a_no_op(plan in arb_plan()) {
        let buf = source();
        let first = apply_plan(&buf, plan.clone()).unwrap();
        let second = apply_plan(&first.buffer, plan).unwrap();
        prop_assert!(!second.changed);
        prop_assert_eq!(second.buffer, first.buffer);
    }

    #[test]
    fn source_drawn_fixes_splice_or_report_present(plan in arb_source_drawn_plan()) {
        let buf = source();
        let out = apply_plan(&buf, plan.clone()).unwrap();
        let skipped: Vec<bool> = out.edits.iter().map(|e| e.already_present).collect();

        if skipped.iter().any(|s| *s) {
            for (e, skipped) in plan.edits().iter().zip(&skipped) {
                let Replacement::Literal(text) = &e.replacement else { continue };
                prop_assert_eq!(*skipped, split_lines(text).len() != e.range.len());
            }
            let expected = splice_over_applied(&buf, &plan);
            prop_assert_eq!(out.buffer.lines(), expected.as_slice());
        } else {
            let expected = plain_splice(&buf, &plan);
            prop_assert_eq!(out.buffer.lines(), expected.as_slice());
        }
        prop_assert_eq!(out.changed, out.buffer.lines() != buf.lines());
    }

    #[test]
    fn source_drawn_plans_are_idempotent(plan in arb_source_drawn_plan()) {
        let buf = source();
        let first = apply_plan(&buf, plan.clone()).unwrap();
        let second = apply_plan(&first.buffer, plan).unwrap();
        prop_assert!(!second.changed);
        prop_assert_eq!(second.buffer, first.buffer);
    }

    #[test]
    fn changed_matches_content(plan in arb_plan()) {
        let buf = source();
        let out = apply_plan(&buf, plan).unwrap();
        prop_assert_eq!(out.changed, out.buffer.to_text() != buf.to_text());
    }
}

fn finding(id: &str, start: usize, end: usize, fix: Option<&str>) -> Finding {
    Finding {
        id: FindingId::from(id),
        file_path: "a.txt".into(),
        start_line: start,
        end_line: end,
        description: format!("finding {id}"),
        suggested_fix: fix.map(str::to_string),
    }
}

#[test]
fn planned_overlap_keeps_first_fix_only() {
    let buf = SourceBuffer::from_lines((1..=10).map(|i| format!("L{i}")).collect());
    let outcome = PatchPlanner::new("a.txt")
        .plan(
            &[
                finding("first", 2, 3, Some("X")),
                finding("second", 3, 4, Some("Y")),
            ],
            buf.line_count(),
        )
        .unwrap();

    let out = apply_plan(&buf, outcome.plan).unwrap();
    let expected: Vec<String> = ["L1", "X", "L4", "L5", "L6", "L7", "L8", "L9", "L10"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(out.buffer.lines(), expected.as_slice());
}

#[test]
fn blank_suggested_fix_leaves_artifact_unchanged() {
    let buf = SourceBuffer::from_text("a\nb\nc\nd\ne\n");
    let outcome = PatchPlanner::new("a.txt")
        .plan(&[finding("blank", 5, 5, Some(""))], buf.line_count())
        .unwrap();

    let out = apply_plan(&buf, outcome.plan).unwrap();
    assert!(!out.changed);
    assert_eq!(out.buffer.to_text(), "a\nb\nc\nd\ne\n");
}
