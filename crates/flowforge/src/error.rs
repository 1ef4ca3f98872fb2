//! Error types for Flowforge operations.
//!
//! The transforms themselves never fail; they return diagnostics next to a
//! best-effort result. [`FlowforgeError`] covers everything around them:
//! reading files, configuration, the pipeline session and serialization.

use std::io;

use thiserror::Error;

use flowforge_core::error::Diagnostic;

use crate::pipeline::PipelineError;

/// The main error type for Flowforge operations.
///
/// # Diagnostic Variants
///
/// The `Parse` variant carries the error-severity diagnostics of a source
/// together with the source text, so callers can render them with spans.
#[derive(Debug, Error)]
pub enum FlowforgeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{} error{} in source", diagnostics.len(), if diagnostics.len() == 1 { "" } else { "s" })]
    Parse {
        diagnostics: Vec<Diagnostic>,
        src: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowforgeError {
    /// Create a new `Parse` error with the associated source code.
    pub fn new_parse_error(diagnostics: Vec<Diagnostic>, src: impl Into<String>) -> Self {
        Self::Parse {
            diagnostics,
            src: src.into(),
        }
    }
}
