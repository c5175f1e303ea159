//! # Validation Errors
//!
//! Structured errors for domain primitive construction, built with
//! `thiserror`. Each variant carries the rejected input so that operators
//! can diagnose misconfiguration without guesswork.

use thiserror::Error;

/// Validation errors for domain primitive newtypes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Principal identifier is empty or contains whitespace/control characters.
    #[error("invalid principal: \"{0}\" (expected a non-empty identifier without whitespace)")]
    InvalidPrincipal(String),

    /// Amount string is not a non-negative integer in smallest units.
    #[error("invalid amount: \"{0}\" (expected a non-negative integer)")]
    InvalidAmount(String),

    /// Timestamp string is not valid RFC 3339.
    #[error("invalid timestamp: \"{value}\" ({reason})")]
    InvalidTimestamp {
        /// The string that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_principal_display() {
        let err = ValidationError::InvalidPrincipal("a b".to_string());
        let msg = format!("{err}");
        assert!(msg.contains("a b"));
        assert!(msg.contains("whitespace"));
    }

    #[test]
    fn invalid_amount_display() {
        let err = ValidationError::InvalidAmount("-5".to_string());
        assert!(format!("{err}").contains("-5"));
    }

    #[test]
    fn invalid_timestamp_display() {
        let err = ValidationError::InvalidTimestamp {
            value: "yesterday".to_string(),
            reason: "parse failed".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("yesterday"));
        assert!(msg.contains("parse failed"));
    }
}
