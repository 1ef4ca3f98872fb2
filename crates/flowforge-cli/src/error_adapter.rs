//! Error adapter for converting [`FlowforgeError`] to miette diagnostics.
//!
//! This module provides the bridge between the library's error and
//! diagnostic types and miette's rich report formatting used in the CLI.
//!
//! # Multi-Error Support
//!
//! A [`FlowforgeError::Parse`] carries every error-severity diagnostic of a
//! source; each one is rendered independently.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan, SourceSpan};

use flowforge::{
    FlowforgeError,
    diagnostics::{Diagnostic, Severity},
    span::{Location, Span},
};

/// Adapter for a single flowforge diagnostic.
///
/// The label points at the diagnostic's byte span or, for diagnostics that
/// only know a line and column, at the character there.
pub struct DiagnosticAdapter<'a> {
    diag: &'a Diagnostic,
    src: &'a str,
}

impl<'a> DiagnosticAdapter<'a> {
    pub fn new(diag: &'a Diagnostic, src: &'a str) -> Self {
        Self { diag, src }
    }

    fn source_span(&self) -> Option<SourceSpan> {
        if let Some(span) = self.diag.span() {
            return Some(span_to_miette(span));
        }
        let offset = offset_of(self.src, self.diag.location()?)?;
        let len = self.src[offset..].chars().next().map_or(0, char::len_utf8);
        Some(SourceSpan::new(offset.into(), len))
    }
}

impl fmt::Debug for DiagnosticAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticAdapter")
            .field("diag", &self.diag)
            .finish()
    }
}

impl fmt::Display for DiagnosticAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.diag.message())
    }
}

impl std::error::Error for DiagnosticAdapter<'_> {}

impl MietteDiagnostic for DiagnosticAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diag
            .code()
            .map(|c| Box::new(c) as Box<dyn fmt::Display>)
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.diag.severity() {
            Severity::Error => miette::Severity::Error,
            Severity::Warning => miette::Severity::Warning,
            Severity::Info => miette::Severity::Advice,
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diag
            .help()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.source_span()?;
        Some(Box::new(std::iter::once(
            LabeledSpan::new_primary_with_span(None, span),
        )))
    }
}

/// Adapter for non-diagnostic [`FlowforgeError`] variants.
///
/// This adapter handles errors that don't have source positions, such as
/// I/O, configuration, pipeline and serialization errors.
pub struct ErrorAdapter<'a>(pub &'a FlowforgeError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match &self.0 {
            FlowforgeError::Io(_) => "flowforge::io",
            FlowforgeError::Parse { .. } => return None,
            FlowforgeError::Config(_) => "flowforge::config",
            FlowforgeError::Pipeline(_) => "flowforge::pipeline",
            FlowforgeError::Serialization(_) => "flowforge::serialization",
        };
        Some(Box::new(code))
    }
}

/// A reportable error that can be rendered by miette.
///
/// This enum wraps either a single diagnostic or a non-diagnostic error,
/// providing a uniform interface for error rendering.
#[derive(Debug)]
pub enum Reportable<'a> {
    /// A rich diagnostic with source location information.
    Diagnostic(DiagnosticAdapter<'a>),
    /// A simple error without source location.
    Error(ErrorAdapter<'a>),
}

impl fmt::Display for Reportable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reportable::Diagnostic(d) => fmt::Display::fmt(d, f),
            Reportable::Error(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for Reportable<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Reportable::Diagnostic(_) => None,
            Reportable::Error(e) => e.source(),
        }
    }
}

impl MietteDiagnostic for Reportable<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Diagnostic(d) => d.code(),
            Reportable::Error(e) => e.code(),
        }
    }

    fn severity(&self) -> Option<miette::Severity> {
        match self {
            Reportable::Diagnostic(d) => d.severity(),
            Reportable::Error(e) => e.severity(),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Diagnostic(d) => d.help(),
            Reportable::Error(e) => e.help(),
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            Reportable::Diagnostic(d) => d.source_code(),
            Reportable::Error(e) => e.source_code(),
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        match self {
            Reportable::Diagnostic(d) => d.labels(),
            Reportable::Error(e) => e.labels(),
        }
    }
}

/// Convert a flowforge [`Span`] to a miette [`SourceSpan`].
fn span_to_miette(span: Span) -> SourceSpan {
    SourceSpan::new(span.start().into(), span.len())
}

/// Byte offset of a 1-based line and character column, if it lies within
/// `src` (the position just past the end counts).
fn offset_of(src: &str, location: Location) -> Option<usize> {
    let line_start = if location.line <= 1 {
        0
    } else {
        src.match_indices('\n').nth(location.line - 2)?.0 + 1
    };
    let line = src[line_start..].split('\n').next().unwrap_or_default();

    let column = location.column.saturating_sub(1);
    match line.char_indices().nth(column) {
        Some((offset, _)) => Some(line_start + offset),
        None if column == line.chars().count() => Some(line_start + line.len()),
        None => None,
    }
}

/// Convert a [`FlowforgeError`] into a list of reportable errors.
///
/// For [`FlowforgeError::Parse`], this returns one [`Reportable`] for
/// each diagnostic in the error. For other error variants, this returns a
/// single [`Reportable`].
pub fn to_reportables(err: &FlowforgeError) -> Vec<Reportable<'_>> {
    match err {
        FlowforgeError::Parse { diagnostics, src } => diagnostics
            .iter()
            .map(|d| Reportable::Diagnostic(DiagnosticAdapter::new(d, src)))
            .collect(),
        _ => vec![Reportable::Error(ErrorAdapter(err))],
    }
}

#[cfg(test)]
mod tests {
    use flowforge::diagnostics::DiagnosticCode;

    use super::*;

    #[test]
    fn test_one_reportable_per_diagnostic() {
        let diagnostics = vec![
            Diagnostic::error("unexpected `}`")
                .with_code(DiagnosticCode::FC130)
                .with_span(Span::new(10..11))
                .with_help("remove the extra brace"),
            Diagnostic::error("unterminated string").with_code(DiagnosticCode::FC121),
        ];
        let err = FlowforgeError::new_parse_error(diagnostics, "diagram {}}");

        let reportables = to_reportables(&err);
        assert_eq!(reportables.len(), 2);

        let Reportable::Diagnostic(first) = &reportables[0] else {
            panic!("expected a diagnostic");
        };
        assert_eq!(first.to_string(), "unexpected `}`");
        assert_eq!(first.code().unwrap().to_string(), "FC130");
        assert_eq!(first.help().unwrap().to_string(), "remove the extra brace");
        assert_eq!(first.labels().unwrap().count(), 1);

        let Reportable::Diagnostic(second) = &reportables[1] else {
            panic!("expected a diagnostic");
        };
        assert!(second.labels().is_none());
    }

    #[test]
    fn test_location_without_span_gets_a_label() {
        let diag = Diagnostic::error("syntax error").at(Location::new(2, 3));
        let adapter = DiagnosticAdapter::new(&diag, "ab\ncdef\n");

        let label = adapter.labels().unwrap().next().unwrap();
        assert_eq!(label.offset(), 5);
        assert_eq!(label.len(), 1);
    }

    #[test]
    fn test_offset_of() {
        let src = "héllo\nworld";
        assert_eq!(offset_of(src, Location::new(1, 1)), Some(0));
        assert_eq!(offset_of(src, Location::new(1, 3)), Some(3));
        assert_eq!(offset_of(src, Location::new(2, 6)), Some(src.len()));
        assert_eq!(offset_of(src, Location::new(3, 1)), None);
        assert_eq!(offset_of(src, Location::new(2, 9)), None);
    }

    #[test]
    fn test_non_diagnostic_error() {
        let err = FlowforgeError::Config("bad value".to_string());
        let reportables = to_reportables(&err);
        assert_eq!(reportables.len(), 1);
        assert_eq!(reportables[0].code().unwrap().to_string(), "flowforge::config");
        assert_eq!(reportables[0].to_string(), "Configuration error: bad value");
    }
}
