//! URN error types.

use thiserror::Error;

/// Result type for URN operations.
pub type UrnResult<T> = Result<T, UrnError>;

/// Errors that can occur while constructing or parsing URNs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrnError {
    /// The value is not a valid URN.
    #[error("invalid urn: {0}")]
    Invalid(String),
}

impl UrnError {
    /// Create an invalid-urn error with the given reason.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UrnError::invalid("empty string");
        assert_eq!(err.to_string(), "invalid urn: empty string");
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(UrnError::invalid("x"), UrnError::invalid("x"));
        assert_ne!(UrnError::invalid("x"), UrnError::invalid("y"));
    }
}
