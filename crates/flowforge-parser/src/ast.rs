//! Syntax tree produced by the parser.
//!
//! Values are kept as written; `${var}` interpolation, id qualification and
//! reference resolution happen later in the [`builder`](crate::builder).

use flowforge_core::{
    error::Diagnostic,
    model::{ArrowKind, LayoutMode, Style},
    span::{Location, Span},
};

/// A whole source file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DslDocument {
    pub imports: Vec<Import>,
    pub components: Vec<Component>,
    pub diagrams: Vec<Diagram>,
    /// Lexer and parser diagnostics, in source order per phase.
    pub diagnostics: Vec<Diagnostic>,
}

/// A string value together with where it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
    pub location: Location,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: Span, location: Location) -> Self {
        Self {
            value,
            span,
            location,
        }
    }
}

pub type Name = Spanned<String>;

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub path: Name,
}

/// A reusable, parameterized block of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: Name,
    pub params: Vec<Name>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagram {
    pub title: Name,
    /// The explicit id after the title, or a slug of the title.
    pub id: String,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Node(NodeStatement),
    Group(GroupStatement),
    Edge(EdgeStatement),
    Use(UseStatement),
    Layout(LayoutStatement),
    Theme(ThemeStatement),
    Note(NoteStatement),
    Style(StyleStatement),
    Data(DataStatement),
}

impl Statement {
    /// Span of the statement's first token.
    pub fn span(&self) -> Span {
        self.head().span
    }

    pub fn location(&self) -> Location {
        self.head().location
    }

    fn head(&self) -> &Spanned<String> {
        match self {
            Statement::Node(node) => &node.id,
            Statement::Group(group) => &group.id,
            Statement::Edge(edge) => &edge.from,
            Statement::Use(call) => &call.component,
            Statement::Layout(layout) => &layout.keyword,
            Statement::Theme(theme) => &theme.name,
            Statement::Note(note) => &note.target,
            Statement::Style(style) => &style.target,
            Statement::Data(data) => &data.target,
        }
    }
}

/// Options accepted after `node <id>`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeOptions {
    pub label: Option<Name>,
    pub kind: Option<Name>,
    pub icon: Option<Name>,
    pub color: Option<Name>,
    pub style: Option<Style>,
    pub width: Option<u64>,
    pub height: Option<u64>,
    pub note: Option<Name>,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeStatement {
    pub id: Name,
    pub options: NodeOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupStatement {
    pub id: Name,
    pub label: Option<Name>,
    pub style: Option<Style>,
    pub body: Vec<Statement>,
}

/// One hop of an edge chain: the arrow and the node it points at.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeHop {
    pub arrow: ArrowKind,
    pub to: Name,
}

/// `from -> to [-> more] [: label] [when cond] [style ".."] [note ".."]`
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeStatement {
    pub from: Name,
    pub hops: Vec<EdgeHop>,
    pub label: Option<Name>,
    pub condition: Option<Name>,
    pub style: Option<Style>,
    pub note: Option<Name>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UseStatement {
    pub component: Name,
    pub args: Vec<Name>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutStatement {
    /// The `layout` keyword itself, for positions.
    pub keyword: Name,
    pub mode: LayoutMode,
    pub values: Vec<Name>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThemeStatement {
    pub name: Name,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoteStatement {
    pub target: Name,
    pub text: Name,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleStatement {
    pub target: Name,
    pub style: Style,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataStatement {
    pub target: Name,
    pub data: serde_json::Value,
}
