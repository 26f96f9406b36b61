//! Error types for the AT protocol.

use thiserror::Error;

/// Errors that can occur when parsing AT protocol lines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A comma-separated record could not be parsed.
    #[error("parse {prefix} line {line:?}: {reason}")]
    MalformedRecord {
        /// The record prefix that matched (e.g. `+CMGL: `).
        prefix: String,
        /// The raw line as received.
        line: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A record line was not followed by its payload line.
    #[error("{prefix} record {line:?} has no payload line")]
    MissingPayload {
        /// The record prefix that matched.
        prefix: String,
        /// The raw record line.
        line: String,
    },
}

impl ProtocolError {
    /// Create a malformed record error.
    pub fn malformed(prefix: &str, line: &str, reason: impl Into<String>) -> Self {
        ProtocolError::MalformedRecord {
            prefix: prefix.to_string(),
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_prefix_and_line() {
        let err = ProtocolError::malformed("+CMGL: ", "x,0,,23", "invalid index");
        let text = err.to_string();
        assert!(text.contains("+CMGL: "));
        assert!(text.contains("x,0,,23"));
        assert!(text.contains("invalid index"));
    }
}
