//! Error and diagnostic system shared by every Flowforge stage.
//!
//! This module provides:
//! - Stable diagnostic codes ([`DiagnosticCode`]) consumers may match on
//! - Severity levels
//! - A diagnostic collector for accumulating multiple findings
//!
//! # Overview
//!
//! Diagnostics are data, never panics: the lexer, parser, diagram builder
//! and control-flow builder all push [`Diagnostic`]s into a
//! [`DiagnosticCollector`] and return them alongside a best-effort result.
//!
//! # Example
//!
//! ```
//! # use flowforge_core::error::{Diagnostic, DiagnosticCode};
//! # use flowforge_core::span::{Location, Span};
//! let diag = Diagnostic::warning("node `a` is defined multiple times")
//!     .with_code(DiagnosticCode::FC310)
//!     .at(Location::new(4, 5))
//!     .with_span(Span::new(40..46))
//!     .with_help("the later definition replaces the earlier one");
//! ```

mod collector;
mod diagnostic;
mod error_code;
mod severity;

pub use collector::DiagnosticCollector;
pub use diagnostic::Diagnostic;
pub use error_code::{DiagnosticCode, UnknownCode};
pub use severity::Severity;
