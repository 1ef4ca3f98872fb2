//! Severity levels for diagnostics.
//!
//! This module defines the severity of diagnostic messages, distinguishing
//! between errors, advisory warnings and purely informational notes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The severity level of a diagnostic.
///
/// None of the severities abort processing: diagnostics are always returned
/// alongside a (possibly degraded) result.
/// - [`Severity::Error`] marks input that could not be understood
/// - [`Severity::Warning`] marks input that was understood but is suspicious
/// - [`Severity::Info`] marks a decision the pipeline made on the caller's behalf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Input that could not be understood.
    ///
    /// The offending construct was skipped or the result degraded.
    Error,

    /// Input that was accepted but is likely a mistake.
    ///
    /// Duplicate ids and dangling edges fall in this category.
    Warning,

    /// An informational note about how the input was interpreted.
    Info,
}

impl Severity {
    /// Returns `true` if this is an error severity.
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error)
    }

    /// Returns `true` if this is a warning severity.
    pub fn is_warning(&self) -> bool {
        matches!(self, Severity::Warning)
    }

    /// Returns `true` if this is an info severity.
    pub fn is_info(&self) -> bool {
        matches!(self, Severity::Info)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_predicates() {
        assert!(Severity::Error.is_error());
        assert!(Severity::Warning.is_warning());
        assert!(Severity::Info.is_info());
        assert!(!Severity::Info.is_error());
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }
}
