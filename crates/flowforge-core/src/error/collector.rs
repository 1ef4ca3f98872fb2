//! Collector for accumulating diagnostics during a processing phase.
//!
//! The [`DiagnosticCollector`] allows phases to report multiple errors and
//! warnings instead of failing on the first one encountered.

use crate::error::{Diagnostic, Severity};

/// A collector for accumulating diagnostics during a processing phase.
///
/// # Example
///
/// ```
/// # use flowforge_core::error::{Diagnostic, DiagnosticCode, DiagnosticCollector};
/// let mut collector = DiagnosticCollector::new();
///
/// collector.emit(
///     Diagnostic::warning("edge target `b` is not defined")
///         .with_code(DiagnosticCode::FC332),
/// );
///
/// assert!(!collector.has_errors());
/// assert_eq!(collector.finish().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
    has_errors: bool,
}

impl DiagnosticCollector {
    /// Create a new empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a diagnostic to this collector.
    ///
    /// The diagnostic is added to the collection and if it's an error, the
    /// collector is marked as having errors.
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity().is_error() {
            self.has_errors = true;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Emit every diagnostic from an iterator.
    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.emit(diagnostic);
        }
    }

    /// Returns `true` if at least one error-severity diagnostic was emitted.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// Number of diagnostics of the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|diag| diag.severity() == severity)
            .count()
    }

    /// All diagnostics emitted so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Finish collection and return every diagnostic in emission order.
    pub fn finish(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticCode;

    #[test]
    fn test_collector_new_is_empty() {
        let collector = DiagnosticCollector::new();
        assert!(!collector.has_errors());
        assert!(collector.finish().is_empty());
    }

    #[test]
    fn test_collector_emit_error_marks_errors() {
        let mut collector = DiagnosticCollector::new();

        collector.emit(Diagnostic::error("test error"));

        assert!(collector.has_errors());
    }

    #[test]
    fn test_collector_warnings_do_not_mark_errors() {
        let mut collector = DiagnosticCollector::new();

        collector.emit(Diagnostic::warning("warning 1"));
        collector.emit(Diagnostic::info("note 1"));

        assert!(!collector.has_errors());
        assert_eq!(collector.count(Severity::Warning), 1);
        assert_eq!(collector.count(Severity::Info), 1);
    }

    #[test]
    fn test_collector_keeps_emission_order() {
        let mut collector = DiagnosticCollector::new();

        collector.emit(Diagnostic::error("error 1").with_code(DiagnosticCode::FC120));
        collector.extend([
            Diagnostic::warning("warning 1"),
            Diagnostic::error("error 2"),
        ]);

        let diagnostics = collector.finish();
        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics[0].message(), "error 1");
        assert_eq!(diagnostics[2].message(), "error 2");
    }
}
