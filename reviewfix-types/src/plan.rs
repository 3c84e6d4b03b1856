use crate::buffer::{SourceBuffer, split_lines};
use crate::finding::{FindingId, LineRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// What an edit puts in place of its range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Replacement {
    /// Final text, from a literal suggested fix or from the oracle.
    Literal(String),
    /// Placeholder; must be resolved through the oracle before the plan is applied.
    Pending,
    /// Leave the range as it is.
    Keep,
}

impl Replacement {
    pub fn is_pending(&self) -> bool {
        matches!(self, Replacement::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub range: LineRange,
    pub replacement: Replacement,
    /// Back-reference for traceability only.
    pub source_finding_id: FindingId,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanViolation {
    #[error("edit {id} at {range} is not after the previous edit at {previous}")]
    OutOfOrder {
        id: FindingId,
        range: LineRange,
        previous: LineRange,
    },

    #[error("edit {id} at {range} overlaps edit at {previous}")]
    Overlap {
        id: FindingId,
        range: LineRange,
        previous: LineRange,
    },

    #[error("edit {id} has an empty range {range}")]
    EmptyRange { id: FindingId, range: LineRange },
}

/// Ordered, non-overlapping edits for one artifact.
///
/// Edits are in strictly increasing start-line order and no two ranges intersect. Every
/// constructor checks this, so holders of an `EditPlan` can rely on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditPlan {
    edits: Vec<Edit>,
}

impl EditPlan {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_edits(edits: Vec<Edit>) -> Result<Self, PlanViolation> {
        let mut previous: Option<LineRange> = None;
        for e in &edits {
            if e.range.start == 0 || e.range.is_empty() {
                return Err(PlanViolation::EmptyRange {
                    id: e.source_finding_id.clone(),
                    range: e.range,
                });
            }
            if let Some(prev) = previous {
                if e.range.start <= prev.start {
                    return Err(PlanViolation::OutOfOrder {
                        id: e.source_finding_id.clone(),
                        range: e.range,
                        previous: prev,
                    });
                }
                if e.range.overlaps(&prev) {
                    return Err(PlanViolation::Overlap {
                        id: e.source_finding_id.clone(),
                        range: e.range,
                        previous: prev,
                    });
                }
            }
            previous = Some(e.range);
        }
        Ok(Self { edits })
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    pub fn into_edits(self) -> Vec<Edit> {
        self.edits
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn pending_ids(&self) -> Vec<FindingId> {
        self.edits
            .iter()
            .filter(|e| e.replacement.is_pending())
            .map(|e| e.source_finding_id.clone())
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        self.edits.iter().any(|e| e.replacement.is_pending())
    }

    /// Whether `buffer` reads like the output of a previous application of this plan.
    ///
    /// Walks the edits in order, shifting each by the line-count delta of the ones before it.
    /// Every length-changing literal must sit at its shifted position and every other edit must
    /// still fit there. Empty literals cannot be checked and only shift. A plan with no
    /// checkable literal never matches, since same-length edits re-apply as no-ops anyway.
    ///
    /// A fresh buffer can match too, when the text a fix introduces already surrounds the
    /// range it replaces; the two cases are indistinguishable from the buffer alone.
    pub fn matches_applied(&self, buffer: &SourceBuffer) -> bool {
        let all = buffer.lines();
        let mut offset: isize = 0;
        let mut checked = false;
        for e in &self.edits {
            let Some(at) = e
                .range
                .start
                .checked_add_signed(offset)
                .and_then(|s| s.checked_sub(1))
            else {
                return false;
            };
            let new_lines = match &e.replacement {
                Replacement::Literal(text) => split_lines(text),
                Replacement::Keep | Replacement::Pending => Vec::new(),
            };
            let resized = matches!(e.replacement, Replacement::Literal(_))
                && new_lines.len() != e.range.len();
            if !resized {
                if at + e.range.len() > all.len() {
                    return false;
                }
                continue;
            }
            if !new_lines.is_empty() {
                if all.get(at..at + new_lines.len()) != Some(&new_lines[..]) {
                    return false;
                }
                checked = true;
            }
            offset += new_lines.len() as isize - e.range.len() as isize;
        }
        checked
    }

    /// Fill pending edits from `proposals` and prune the ones left without text.
    ///
    /// Returns the resolved plan and the ids of the pruned edits, in plan order. Removing edits
    /// from a valid plan keeps it valid.
    pub fn resolve(self, proposals: &BTreeMap<FindingId, String>) -> (EditPlan, Vec<FindingId>) {
        let mut kept = Vec::with_capacity(self.edits.len());
        let mut pruned = Vec::new();
        for mut edit in self.edits {
            if edit.replacement.is_pending() {
                match proposals.get(&edit.source_finding_id) {
                    Some(text) => edit.replacement = Replacement::Literal(text.clone()),
                    None => {
                        pruned.push(edit.source_finding_id);
                        continue;
                    }
                }
            }
            kept.push(edit);
        }
        (EditPlan { edits: kept }, pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(id: &str, start: usize, end: usize, r: Replacement) -> Edit {
        Edit {
            range: LineRange::new(start, end),
            replacement: r,
            source_finding_id: FindingId::from(id),
        }
    }

    #[test]
    fn rejects_overlapping_edits() {
        let err = EditPlan::from_edits(vec![
            edit("a", 2, 3, Replacement::Keep),
            edit("b", 3, 4, Replacement::Keep),
        ])
        .unwrap_err();
        assert!(matches!(err, PlanViolation::Overlap { .. }));
    }

    #[test]
    fn rejects_unordered_edits() {
        let err = EditPlan::from_edits(vec![
            edit("a", 5, 5, Replacement::Keep),
            edit("b", 1, 1, Replacement::Keep),
        ])
        .unwrap_err();
        assert!(matches!(err, PlanViolation::OutOfOrder { .. }));
    }

    #[test]
    fn rejects_zero_line() {
        let err = EditPlan::from_edits(vec![edit("a", 0, 1, Replacement::Keep)]).unwrap_err();
        assert!(matches!(err, PlanViolation::EmptyRange { .. }));
    }

    #[test]
    fn resolve_fills_and_prunes_pending() {
        let plan = EditPlan::from_edits(vec![
            edit("lit", 1, 1, Replacement::Literal("x".into())),
            edit("p1", 3, 4, Replacement::Pending),
            edit("p2", 6, 6, Replacement::Pending),
        ])
        .unwrap();
        assert_eq!(plan.pending_ids(), vec![FindingId::from("p1"), FindingId::from("p2")]);

        let mut proposals = BTreeMap::new();
        proposals.insert(FindingId::from("p2"), "fixed".to_string());

        let (resolved, pruned) = plan.resolve(&proposals);
        assert_eq!(pruned, vec![FindingId::from("p1")]);
        assert_eq!(resolved.len(), 2);
        assert!(!resolved.has_pending());
        assert_eq!(
            resolved.edits()[1].replacement,
            Replacement::Literal("fixed".into())
        );
    }

    #[test]
    fn matches_applied_follows_shifted_positions() {
        let plan = EditPlan::from_edits(vec![
            edit("shrink", 2, 3, Replacement::Literal("X".into())),
            edit("grow", 6, 6, Replacement::Literal("Y1\nY2".into())),
        ])
        .unwrap();
        let fresh = SourceBuffer::from_text("a\nb\nc\nd\ne\nf\ng\n");
        let applied = SourceBuffer::from_text("a\nX\nd\ne\nY1\nY2\ng\n");
        assert!(!plan.matches_applied(&fresh));
        assert!(plan.matches_applied(&applied));
    }

    #[test]
    fn matches_applied_needs_every_length_change_in_place() {
        let plan = EditPlan::from_edits(vec![
            edit("shrink", 2, 3, Replacement::Literal("X".into())),
            edit("grow", 6, 6, Replacement::Literal("Y1\nY2".into())),
        ])
        .unwrap();
        let half = SourceBuffer::from_text("a\nX\nd\ne\nf\ng\n");
        assert!(!plan.matches_applied(&half));
    }

    #[test]
    fn matches_applied_needs_later_edits_to_fit() {
        // The growth looks applied, but the shifted keep would run past the end.
        let plan = EditPlan::from_edits(vec![
            edit("grow", 1, 1, Replacement::Literal("a\nb".into())),
            edit("tail", 3, 3, Replacement::Keep),
        ])
        .unwrap();
        assert!(!plan.matches_applied(&SourceBuffer::from_text("a\nb\nc\n")));
        assert!(plan.matches_applied(&SourceBuffer::from_text("a\nb\nc\nd\n")));
    }

    #[test]
    fn same_length_plans_never_match() {
        let plan =
            EditPlan::from_edits(vec![edit("same", 1, 1, Replacement::Literal("a".into()))]).unwrap();
        assert!(!plan.matches_applied(&SourceBuffer::from_text("a\n")));
    }

    #[test]
    fn replacement_serializes_with_kind_tag() {
        let json = serde_json::to_value(Replacement::Literal("x".into())).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "literal", "text": "x"}));
        let json = serde_json::to_value(Replacement::Pending).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "pending"}));
    }
}
