use thiserror::Error;

/// Failure that leaves nothing to parse.
///
/// Everything short of this is reported as a [`Diagnostic`] next to a
/// partial result.
///
/// [`Diagnostic`]: flowforge_core::error::Diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("cannot parse an empty token stream")]
    EmptyTokenStream,
}
