//! # Flowforge Parser
//!
//! Front end for the Flowforge flowchart language. This crate provides the
//! pipeline from source text to a resolved [`DiagramModel`]:
//!
//! 1. **Tokenize** - Convert source text to tokens ([`lexer::tokenize`])
//! 2. **Parse** - Build the syntax tree ([`parser::parse_tokens`])
//! 3. **Build** - Resolve groups, components, variables and annotations
//!    ([`DiagramBuilder`])
//!
//! No stage fails on bad input: each one returns a best-effort result and
//! records [`Diagnostic`](flowforge_core::error::Diagnostic)s.
//!
//! ## Usage
//!
//! ```
//! # use flowforge_parser::parse_dsl;
//! let model = parse_dsl(r#"
//!     diagram "Checkout" {
//!         node cart label "Cart"
//!         node pay label "Payment"
//!         cart -> pay
//!     }
//! "#);
//!
//! assert_eq!(model.nodes.len(), 2);
//! assert!(model.meta.diagnostics.is_empty());
//! ```

pub mod ast;
mod builder;
mod error;
pub mod lexer;
pub mod parser;
pub mod tokens;

pub use builder::{DiagramBuilder, ImportResolver, Variables};
pub use error::ParseError;

use log::{debug, info};

use flowforge_core::model::DiagramModel;

use ast::DslDocument;

/// Tokenize and parse `source` into a syntax tree.
///
/// Lexer diagnostics come first in [`DslDocument::diagnostics`], followed by
/// parser diagnostics.
pub fn parse_document(source: &str) -> DslDocument {
    let (tokens, mut diagnostics) = lexer::tokenize(source);
    let mut document = parser::parse_tokens(source, &tokens).unwrap_or_default();

    diagnostics.append(&mut document.diagnostics);
    document.diagnostics = diagnostics;

    debug!(
        imports = document.imports.len(),
        components = document.components.len(),
        diagrams = document.diagrams.len(),
        diagnostics = document.diagnostics.len();
        "Parsed document"
    );
    document
}

/// Parse and build `source` with no variables and no import resolver.
pub fn parse_dsl(source: &str) -> DiagramModel {
    info!(bytes = source.len(); "Building diagram from source");
    DiagramBuilder::new().build(&parse_document(source))
}
