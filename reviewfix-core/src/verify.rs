//! Structural sanity check between `Applied` and `Verified`.
//!
//! This is not a grammar check: it confirms the new buffer is still a well-formed sequence of
//! lines that will be written and read back unchanged.

use reviewfix_edit::ApplyOutcome;
use reviewfix_types::SourceBuffer;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("line count is {actual}, expected {expected} from the applied edits")]
    LineCount { expected: usize, actual: usize },

    #[error("line {line} does not survive a write/read round trip")]
    LineStructure { line: usize },

    #[error("output has {after} U+FFFD replacement characters, input had {before}")]
    ReplacementCharacter { before: usize, after: usize },
}

pub fn verify(before: &SourceBuffer, applied: &ApplyOutcome) -> Result<(), VerifyError> {
    let after = &applied.buffer;

    let (removed, inserted) = applied
        .edits
        .iter()
        .fold((0usize, 0usize), |(r, i), e| (r + e.removed, i + e.inserted));
    let expected = before.line_count() + inserted - removed;
    if after.line_count() != expected {
        return Err(VerifyError::LineCount {
            expected,
            actual: after.line_count(),
        });
    }

    let reread = SourceBuffer::from_text(&after.to_text());
    if reread.lines() != after.lines() {
        let line = reread
            .lines()
            .iter()
            .zip(after.lines())
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| reread.line_count().min(after.line_count()))
            + 1;
        return Err(VerifyError::LineStructure { line });
    }

    let before_fffd = count_replacement_chars(before);
    let after_fffd = count_replacement_chars(after);
    if after_fffd > before_fffd {
        return Err(VerifyError::ReplacementCharacter {
            before: before_fffd,
            after: after_fffd,
        });
    }
    Ok(())
}

fn count_replacement_chars(buffer: &SourceBuffer) -> usize {
    buffer
        .lines()
        .iter()
        .map(|l| l.matches('\u{FFFD}').count())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reviewfix_edit::apply_plan;
    use reviewfix_types::{Edit, EditPlan, FindingId, LineRange, Replacement};

    fn apply_one(
        text: &str,
        start: usize,
        end: usize,
        replacement: &str,
    ) -> (SourceBuffer, ApplyOutcome) {
        let before = SourceBuffer::from_text(text);
        let plan = EditPlan::from_edits(vec![Edit {
            range: LineRange::new(start, end),
            replacement: Replacement::Literal(replacement.to_string()),
            source_finding_id: FindingId::from("f"),
        }])
        .unwrap();
        let out = apply_plan(&before, plan).unwrap();
        (before, out)
    }

    #[test]
    fn ordinary_edit_passes() {
        let (before, out) = apply_one("a\nb\nc\n", 2, 2, "B1\nB2");
        assert_eq!(verify(&before, &out), Ok(()));
    }

    #[test]
    fn new_replacement_characters_fail() {
        let (before, out) = apply_one("a\nb\n", 1, 1, "caf\u{FFFD}");
        assert_eq!(
            verify(&before, &out),
            Err(VerifyError::ReplacementCharacter { before: 0, after: 1 })
        );
    }

    #[test]
    fn trailing_blank_line_without_newline_fails_round_trip() {
        let (before, out) = apply_one("a\nb", 2, 2, "b\n\n");
        assert!(matches!(
            verify(&before, &out),
            Err(VerifyError::LineStructure { .. })
        ));
    }

    #[test]
    fn tampered_line_count_fails() {
        let (before, mut out) = apply_one("a\nb\nc\n", 2, 2, "B");
        out.buffer = out.buffer.with_lines(vec!["a".into(), "B".into()]);
        assert_eq!(
            verify(&before, &out),
            Err(VerifyError::LineCount {
                expected: 3,
                actual: 2
            })
        );
    }
}
