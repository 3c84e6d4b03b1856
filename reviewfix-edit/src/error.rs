//! Error types for reviewfix-edit.
//!
//! Every error here means the plan cannot be applied as a whole; the applier never returns a
//! partially edited buffer.

use reviewfix_types::{FindingId, LineRange};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// An edit still holds the oracle placeholder.
    #[error("edit for finding {id} is still pending oracle resolution")]
    Unresolved { id: FindingId },

    /// An edit's range does not fit the buffer it is applied to.
    #[error("edit for finding {id} at {range} does not fit a buffer of {line_count} lines")]
    RangeOutOfBounds {
        id: FindingId,
        range: LineRange,
        line_count: usize,
    },
}

impl EditError {
    pub fn finding_id(&self) -> &FindingId {
        match self {
            EditError::Unresolved { id } | EditError::RangeOutOfBounds { id, .. } => id,
        }
    }
}

/// Result type alias using EditError.
pub type EditResult<T> = Result<T, EditError>;

#[cfg(test)]
mod tests {
    use super::EditError;
    use reviewfix_types::{FindingId, LineRange};

    #[test]
    fn unresolved_names_the_finding() {
        let err = EditError::Unresolved {
            id: FindingId::from("f1"),
        };
        assert_eq!(err.finding_id().as_str(), "f1");
        assert!(err.to_string().contains("pending"));
    }

    #[test]
    fn out_of_bounds_display_includes_range() {
        let err = EditError::RangeOutOfBounds {
            id: FindingId::from("f2"),
            range: LineRange::new(9, 12),
            line_count: 10,
        };
        assert!(err.to_string().contains("L9-L12"));
        assert!(err.to_string().contains("10 lines"));
    }
}
