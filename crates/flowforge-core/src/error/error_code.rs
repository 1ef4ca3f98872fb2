//! Diagnostic codes for the Flowforge pipeline.
//!
//! Codes form a stable taxonomy that consumers may pattern-match on. They are
//! organized by phase:
//! - `FC10x` - Source-code parse failures
//! - `FC12x` - DSL lexer errors
//! - `FC13x` - DSL parser errors
//! - `FC2xx` - Code to flow graph conversion
//! - `FC3xx` - DSL to diagram semantic pass

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Codes for categorizing diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum DiagnosticCode {
    // =========================================================================
    // Source-code parse failures (FC10x)
    // =========================================================================
    /// Source code syntax error.
    ///
    /// The JavaScript/TypeScript front end rejected the input. The result
    /// degrades to an empty graph.
    FC100,

    /// Unsupported source language.
    ///
    /// The requested language has no front end.
    FC101,

    // =========================================================================
    // DSL lexer errors (FC12x)
    // =========================================================================
    /// Unrecognized character.
    ///
    /// The character is skipped and lexing continues.
    FC120,

    /// Unterminated string literal.
    FC121,

    /// Unterminated template expression.
    ///
    /// A `${` was opened inside an identifier but never closed.
    FC122,

    /// Unterminated block comment.
    FC123,

    // =========================================================================
    // DSL parser errors (FC13x)
    // =========================================================================
    /// Unexpected token at the top level of a document.
    ///
    /// Only `import`, `component` and `diagram` may appear there.
    FC130,

    /// Unexpected token inside a block or statement.
    FC131,

    /// Expected token is missing.
    FC132,

    /// Unterminated block.
    ///
    /// The input ended before the closing `}`.
    FC133,

    /// Unknown layout mode.
    ///
    /// Valid modes are `horizontal`, `vertical`, `grid` and `swimlane`.
    FC134,

    /// Malformed embedded data block.
    ///
    /// The JSON between the braces could not be parsed; an empty object is
    /// used instead.
    FC135,

    // =========================================================================
    // Code to graph (FC2xx)
    // =========================================================================
    /// No function declaration found.
    ///
    /// All top-level statements were used as the function body.
    FC200,

    /// Unreachable statements.
    ///
    /// Statements following an unconditional `return` or `throw` were left
    /// out of the graph.
    FC201,

    // =========================================================================
    // DSL to diagram (FC3xx)
    // =========================================================================
    /// Unknown interpolation variable.
    FC300,

    /// Invalid color value.
    FC301,

    /// Duplicate component definition.
    FC302,

    /// Document declares no diagram.
    FC303,

    /// Additional diagrams were ignored.
    FC304,

    /// Duplicate node definition.
    ///
    /// The later definition replaces the earlier one.
    FC310,

    /// Duplicate group definition.
    ///
    /// Children of both definitions are merged.
    FC311,

    /// Unresolved component.
    FC320,

    /// Recursive component use.
    ///
    /// The component is already being expanded further up the call stack.
    FC321,

    /// Component argument count mismatch.
    FC322,

    /// Annotation target does not exist.
    ///
    /// A `note`, `style` or `data` statement names an unknown node.
    FC330,

    /// Edge source does not exist.
    FC331,

    /// Edge target does not exist.
    FC332,

    /// Unresolved import.
    FC340,
}

impl DiagnosticCode {
    /// Returns the code as a string (e.g., "FC310").
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::FC100 => "FC100",
            DiagnosticCode::FC101 => "FC101",
            DiagnosticCode::FC120 => "FC120",
            DiagnosticCode::FC121 => "FC121",
            DiagnosticCode::FC122 => "FC122",
            DiagnosticCode::FC123 => "FC123",
            DiagnosticCode::FC130 => "FC130",
            DiagnosticCode::FC131 => "FC131",
            DiagnosticCode::FC132 => "FC132",
            DiagnosticCode::FC133 => "FC133",
            DiagnosticCode::FC134 => "FC134",
            DiagnosticCode::FC135 => "FC135",
            DiagnosticCode::FC200 => "FC200",
            DiagnosticCode::FC201 => "FC201",
            DiagnosticCode::FC300 => "FC300",
            DiagnosticCode::FC301 => "FC301",
            DiagnosticCode::FC302 => "FC302",
            DiagnosticCode::FC303 => "FC303",
            DiagnosticCode::FC304 => "FC304",
            DiagnosticCode::FC310 => "FC310",
            DiagnosticCode::FC311 => "FC311",
            DiagnosticCode::FC320 => "FC320",
            DiagnosticCode::FC321 => "FC321",
            DiagnosticCode::FC322 => "FC322",
            DiagnosticCode::FC330 => "FC330",
            DiagnosticCode::FC331 => "FC331",
            DiagnosticCode::FC332 => "FC332",
            DiagnosticCode::FC340 => "FC340",
        }
    }

    /// Returns a short description of what this code means.
    pub fn description(&self) -> &'static str {
        match self {
            DiagnosticCode::FC100 => "source syntax error",
            DiagnosticCode::FC101 => "unsupported language",
            DiagnosticCode::FC120 => "unrecognized character",
            DiagnosticCode::FC121 => "unterminated string literal",
            DiagnosticCode::FC122 => "unterminated template expression",
            DiagnosticCode::FC123 => "unterminated block comment",
            DiagnosticCode::FC130 => "unexpected top-level token",
            DiagnosticCode::FC131 => "unexpected token",
            DiagnosticCode::FC132 => "missing token",
            DiagnosticCode::FC133 => "unterminated block",
            DiagnosticCode::FC134 => "unknown layout mode",
            DiagnosticCode::FC135 => "malformed data block",
            DiagnosticCode::FC200 => "no function declaration",
            DiagnosticCode::FC201 => "unreachable statements",
            DiagnosticCode::FC300 => "unknown variable",
            DiagnosticCode::FC301 => "invalid color",
            DiagnosticCode::FC302 => "duplicate component",
            DiagnosticCode::FC303 => "no diagram",
            DiagnosticCode::FC304 => "extra diagram ignored",
            DiagnosticCode::FC310 => "duplicate node",
            DiagnosticCode::FC311 => "duplicate group",
            DiagnosticCode::FC320 => "unresolved component",
            DiagnosticCode::FC321 => "recursive component",
            DiagnosticCode::FC322 => "argument count mismatch",
            DiagnosticCode::FC330 => "unknown annotation target",
            DiagnosticCode::FC331 => "unknown edge source",
            DiagnosticCode::FC332 => "unknown edge target",
            DiagnosticCode::FC340 => "unresolved import",
        }
    }

    const ALL: [DiagnosticCode; 28] = [
        DiagnosticCode::FC100,
        DiagnosticCode::FC101,
        DiagnosticCode::FC120,
        DiagnosticCode::FC121,
        DiagnosticCode::FC122,
        DiagnosticCode::FC123,
        DiagnosticCode::FC130,
        DiagnosticCode::FC131,
        DiagnosticCode::FC132,
        DiagnosticCode::FC133,
        DiagnosticCode::FC134,
        DiagnosticCode::FC135,
        DiagnosticCode::FC200,
        DiagnosticCode::FC201,
        DiagnosticCode::FC300,
        DiagnosticCode::FC301,
        DiagnosticCode::FC302,
        DiagnosticCode::FC303,
        DiagnosticCode::FC304,
        DiagnosticCode::FC310,
        DiagnosticCode::FC311,
        DiagnosticCode::FC320,
        DiagnosticCode::FC321,
        DiagnosticCode::FC322,
        DiagnosticCode::FC330,
        DiagnosticCode::FC331,
        DiagnosticCode::FC332,
        DiagnosticCode::FC340,
    ];
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a string does not name a known diagnostic code.
#[derive(Debug, Clone, Error)]
#[error("unknown diagnostic code `{0}`")]
pub struct UnknownCode(String);

impl FromStr for DiagnosticCode {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownCode(s.to_string()))
    }
}

impl TryFrom<String> for DiagnosticCode {
    type Error = UnknownCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DiagnosticCode> for &'static str {
    fn from(code: DiagnosticCode) -> Self {
        code.as_str()
    }
}
