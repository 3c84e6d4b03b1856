use thiserror::Error;

/// Failure of one oracle attempt, typed by whether retrying can help.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// Network, timeout, rate limit, or a malformed or empty reply.
    #[error("transient oracle failure: {message}")]
    Transient { message: String },

    /// Authentication or configuration failure.
    #[error("permanent oracle failure: {message}")]
    Permanent { message: String },
}

impl OracleError {
    pub fn transient(message: impl Into<String>) -> Self {
        OracleError::Transient {
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        OracleError::Permanent {
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, OracleError::Transient { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            OracleError::Transient { message } | OracleError::Permanent { message } => message,
        }
    }
}

const MAX_ERROR_CONTENT_LEN: usize = 200;

/// Classify a non-success HTTP status.
pub fn classify_status(status: u16, body: &str) -> OracleError {
    let message = format!("HTTP {status}: {}", truncate_str(body.trim(), MAX_ERROR_CONTENT_LEN));
    match status {
        408 | 429 | 500..=599 => OracleError::transient(message),
        _ => OracleError::permanent(message),
    }
}

fn truncate_str(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_and_request_errors_are_permanent() {
        for status in [400, 401, 403, 404, 422] {
            assert!(!classify_status(status, "").is_transient(), "{status}");
        }
    }

    #[test]
    fn throttling_and_server_errors_are_transient() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(classify_status(status, "").is_transient(), "{status}");
        }
    }

    #[test]
    fn long_bodies_are_truncated_on_char_boundary() {
        let body = "é".repeat(300);
        let err = classify_status(500, &body);
        assert!(err.message().len() < 220);
    }
}
