//! Flowforge - flowcharts from a diagram language or from source code.
//!
//! Two front ends feed one renderer-agnostic [`DiagramModel`](model::DiagramModel):
//!
//! - the Flowforge flowchart language, through [`flowforge_parser`];
//! - JavaScript and TypeScript functions, through the control-flow graph
//!   builder in [`flowforge_cfg`].
//!
//! This crate adds the layered [`layout`] engine, the Mermaid text
//! [`export`]er and the [`pipeline`] that runs both front ends on a worker
//! thread.
//!
//! # Example
//!
//! ```
//! use flowforge::pipeline::{BuildDiagramOptions, Transform, Transformer};
//!
//! let result = Transformer::default().build_diagram(&BuildDiagramOptions::dsl(
//!     r#"diagram "Checkout" { node cart  node pay  cart -> pay }"#,
//! ));
//!
//! assert_eq!(result.model.nodes.len(), 2);
//! assert_eq!(result.layout.unwrap().nodes.len(), 2);
//! ```

pub mod config;
pub mod export;
pub mod layout;
pub mod pipeline;

mod error;

pub use flowforge_core::{color, flow, model, span};
pub use flowforge_core::error as diagnostics;

pub use error::FlowforgeError;

use std::{fs, path::Path};

use log::{debug, trace};

use diagnostics::Diagnostic;

/// Read a source file.
///
/// # Errors
///
/// Returns [`FlowforgeError::Io`] if the file cannot be read.
pub fn read_source(path: impl AsRef<Path>) -> Result<String, FlowforgeError> {
    let path = path.as_ref();
    debug!(path:? = path; "Reading source file");
    let content = fs::read_to_string(path)?;
    trace!(content; "File content");
    Ok(content)
}

/// Fail when `diagnostics` contains any error.
///
/// Warnings and infos are not failures. The returned error carries only the
/// error-severity diagnostics, together with `src` for rendering.
///
/// # Errors
///
/// Returns [`FlowforgeError::Parse`] if at least one diagnostic is an error.
pub fn check_diagnostics(diagnostics: &[Diagnostic], src: &str) -> Result<(), FlowforgeError> {
    let errors: Vec<Diagnostic> = diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.severity().is_error())
        .cloned()
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(FlowforgeError::new_parse_error(errors, src))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticCode;

    #[test]
    fn test_check_diagnostics_ignores_warnings() {
        let diagnostics = vec![
            Diagnostic::warning("duplicate node").with_code(DiagnosticCode::FC310),
            Diagnostic::info("dead code").with_code(DiagnosticCode::FC201),
        ];
        assert!(check_diagnostics(&diagnostics, "").is_ok());
    }

    #[test]
    fn test_check_diagnostics_keeps_errors_only() {
        let diagnostics = vec![
            Diagnostic::warning("duplicate node"),
            Diagnostic::error("unexpected token").with_code(DiagnosticCode::FC130),
        ];

        let err = check_diagnostics(&diagnostics, "node {").unwrap_err();
        let FlowforgeError::Parse { diagnostics, src } = &err else {
            panic!("expected a parse error");
        };
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(src, "node {");
        assert_eq!(err.to_string(), "1 error in source");
    }

    #[test]
    fn test_read_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_source(dir.path().join("missing.flow")).unwrap_err();
        assert!(matches!(err, FlowforgeError::Io(_)));
    }
}
