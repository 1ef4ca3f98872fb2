//! Control-flow graphs from JavaScript and TypeScript source.
//!
//! Source text goes through a [`SourceParser`] front end, which lowers it into
//! the small statement model in [`syntax`], and then through the
//! [`FlowBuilder`], which produces a [`FlowGraph`].
//!
//! # Example
//!
//! ```
//! use flowforge_cfg::parse_code;
//! use flowforge_core::flow::FlowNodeKind;
//!
//! let graph = parse_code("function f(x) { while (x) { x--; } }", "js", false);
//! assert_eq!(graph.nodes_of_kind(FlowNodeKind::Loop).count(), 1);
//! ```

mod builder;
pub mod frontend;
pub mod syntax;

pub use builder::{FlowBuilder, build_flow_graph};
pub use frontend::{FrontendError, SourceLanguage, SourceParser, TreeSitterFrontend};

use flowforge_core::flow::FlowGraph;

use syntax::SourceUnit;

/// Lower `source` written in `language` into the statement model.
///
/// # Errors
///
/// Returns [`FrontendError::UnsupportedLanguage`] for an unknown language
/// and the front end's error when the source does not parse.
pub fn parse_unit(source: &str, language: &str, jsx: bool) -> Result<SourceUnit, FrontendError> {
    let language = language.parse::<SourceLanguage>()?;
    TreeSitterFrontend::new(language, jsx).parse(source)
}

/// Parse `source` written in `language` and build its control-flow graph.
///
/// Failures never escape: an unknown language yields an empty graph with
/// FC101, a syntax error an empty graph with FC100.
pub fn parse_code(source: &str, language: &str, jsx: bool) -> FlowGraph {
    match parse_unit(source, language, jsx) {
        Ok(unit) => build_flow_graph(&unit),
        Err(err) => err.into_graph(),
    }
}
