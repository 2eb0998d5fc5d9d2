// Error types for event and record translation

use thiserror::Error;

/// Result type alias for translation operations
pub type Result<T> = std::result::Result<T, TranslateError>;

/// Faults raised while turning a host payload into backend operations.
///
/// Missing optional fields are never a fault; they map to defaults. These
/// variants cover payload values that cannot be represented downstream.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TranslateError {
    /// Timestamp outside the representable range
    #[error("Invalid timestamp: {0}ms")]
    InvalidTimestamp(i64),

    /// Start time could not be derived from the end time and duration
    #[error("Timestamp overflow: {ts}ms minus {duration_ms}ms")]
    TimestampOverflow { ts: i64, duration_ms: u64 },

    /// A numeric field is NaN or infinite
    #[error("Non-finite value for {0}")]
    NonFiniteValue(&'static str),

    /// The record does not have the expected shape
    #[error("Malformed record: {0}")]
    MalformedRecord(String),
}

impl TranslateError {
    /// Create a malformed record error
    pub fn malformed(msg: impl Into<String>) -> Self {
        TranslateError::MalformedRecord(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TranslateError::TimestampOverflow {
            ts: i64::MIN,
            duration_ms: 100,
        };
        let display = err.to_string();
        assert!(display.contains("minus 100ms"));

        assert_eq!(
            TranslateError::NonFiniteValue("costUsd").to_string(),
            "Non-finite value for costUsd"
        );
        assert_eq!(
            TranslateError::malformed("_meta is not an object").to_string(),
            "Malformed record: _meta is not an object"
        );
    }
}
