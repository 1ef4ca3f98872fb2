//! The statement shapes the flow builder understands.
//!
//! Front ends lower their concrete syntax into these types. Anything the
//! builder does not branch on becomes [`StatementKind::Other`] with a short
//! summary such as `expression` or `variable declaration`.

use std::fmt;

use flowforge_core::span::Location;

/// A lowered source file: the body of the function that gets a graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceUnit {
    /// Name of the function the body came from.
    pub function_name: Option<String>,
    /// Where that function was declared.
    pub location: Option<Location>,
    pub body: Vec<Statement>,
    /// Set when no function declaration was found and `body` holds every
    /// non-import top-level statement instead.
    pub is_fallback: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub location: Location,
}

impl Statement {
    pub fn new(kind: StatementKind, location: Location) -> Self {
        Self { kind, location }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    If {
        /// Source text of the test, without the surrounding parentheses.
        test: String,
        consequent: Vec<Statement>,
        alternate: Option<Vec<Statement>>,
    },
    Loop(LoopStatement),
    Try {
        block: Vec<Statement>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Statement>>,
    },
    Return {
        argument: Option<String>,
    },
    Throw {
        argument: Option<String>,
    },
    Block(Vec<Statement>),
    Other {
        summary: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    For,
    ForIn,
    ForOf,
    While,
    DoWhile,
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self {
            LoopKind::For | LoopKind::ForIn | LoopKind::ForOf => "for",
            LoopKind::While => "while",
            LoopKind::DoWhile => "do-while",
        };
        f.write_str(keyword)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopStatement {
    pub kind: LoopKind,
    /// The header text: the test for `while` loops, `left of right` for
    /// `for-of`, and so on.
    pub head: Option<String>,
    /// `for` loop initializer.
    pub init: Option<String>,
    /// `for` loop update expression.
    pub update: Option<String>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Option<String>,
    pub body: Vec<Statement>,
    pub location: Location,
}
