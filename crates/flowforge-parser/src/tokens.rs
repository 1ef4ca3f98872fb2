//! Token definitions for the flowchart language.

use std::fmt;

use flowforge_core::{
    model::ArrowKind,
    span::{Location, Span},
};

/// Reserved words, matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Import,
    Component,
    Diagram,
    Node,
    Group,
    Use,
    Layout,
    Theme,
    Note,
    Style,
    Data,
    Label,
    Type,
    Icon,
    Color,
    Width,
    Height,
    When,
}

impl Keyword {
    /// Match an already lowercased word against the keyword set.
    pub fn from_lowercase(word: &str) -> Option<Self> {
        let keyword = match word {
            "import" => Keyword::Import,
            "component" => Keyword::Component,
            "diagram" => Keyword::Diagram,
            "node" => Keyword::Node,
            "group" => Keyword::Group,
            "use" => Keyword::Use,
            "layout" => Keyword::Layout,
            "theme" => Keyword::Theme,
            "note" => Keyword::Note,
            "style" => Keyword::Style,
            "data" => Keyword::Data,
            "label" => Keyword::Label,
            "type" => Keyword::Type,
            "icon" => Keyword::Icon,
            "color" => Keyword::Color,
            "width" => Keyword::Width,
            "height" => Keyword::Height,
            "when" => Keyword::When,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Import => "import",
            Keyword::Component => "component",
            Keyword::Diagram => "diagram",
            Keyword::Node => "node",
            Keyword::Group => "group",
            Keyword::Use => "use",
            Keyword::Layout => "layout",
            Keyword::Theme => "theme",
            Keyword::Note => "note",
            Keyword::Style => "style",
            Keyword::Data => "data",
            Keyword::Label => "label",
            Keyword::Type => "type",
            Keyword::Icon => "icon",
            Keyword::Color => "color",
            Keyword::Width => "width",
            Keyword::Height => "height",
            Keyword::When => "when",
        }
    }

    /// Keywords that open a statement inside a block.
    pub fn starts_statement(self) -> bool {
        matches!(
            self,
            Keyword::Node
                | Keyword::Group
                | Keyword::Use
                | Keyword::Layout
                | Keyword::Theme
                | Keyword::Note
                | Keyword::Style
                | Keyword::Data
                | Keyword::Import
                | Keyword::Component
                | Keyword::Diagram
        )
    }

    /// Keywords accepted in a `node` option list.
    pub fn is_node_option(self) -> bool {
        matches!(
            self,
            Keyword::Label
                | Keyword::Type
                | Keyword::Icon
                | Keyword::Color
                | Keyword::Style
                | Keyword::Width
                | Keyword::Height
                | Keyword::Note
                | Keyword::Data
        )
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Semicolon,
    Arrow(ArrowKind),
    Identifier,
    Keyword(Keyword),
    String,
    Number,
    Color,
    Newline,
    Eof,
}

impl TokenKind {
    /// Tokens that can stand for a plain value (a name, a label, an argument).
    pub fn is_value(self) -> bool {
        matches!(
            self,
            TokenKind::Identifier | TokenKind::String | TokenKind::Number | TokenKind::Color
        )
    }

    /// Tokens that end a statement.
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LeftBrace => write!(f, "`{{`"),
            TokenKind::RightBrace => write!(f, "`}}`"),
            TokenKind::LeftParen => write!(f, "`(`"),
            TokenKind::RightParen => write!(f, "`)`"),
            TokenKind::LeftBracket => write!(f, "`[`"),
            TokenKind::RightBracket => write!(f, "`]`"),
            TokenKind::Comma => write!(f, "`,`"),
            TokenKind::Colon => write!(f, "`:`"),
            TokenKind::Semicolon => write!(f, "`;`"),
            TokenKind::Arrow(arrow) => write!(f, "`{arrow}`"),
            TokenKind::Identifier => write!(f, "identifier"),
            TokenKind::Keyword(keyword) => write!(f, "keyword `{keyword}`"),
            TokenKind::String => write!(f, "string"),
            TokenKind::Number => write!(f, "number"),
            TokenKind::Color => write!(f, "color"),
            TokenKind::Newline => write!(f, "newline"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// A token with its literal text and position.
///
/// `value` holds the unescaped contents for strings, the lowercased word for
/// keywords and the source text for everything else.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    /// Set for [`TokenKind::Number`] tokens.
    pub number: Option<f64>,
    pub span: Span,
    pub location: Location,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, span: Span, location: Location) -> Self {
        Self {
            kind,
            value: value.into(),
            number: None,
            span,
            location,
        }
    }

    pub fn line(&self) -> usize {
        self.location.line
    }

    pub fn column(&self) -> usize {
        self.location.column
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Identifier | TokenKind::Number | TokenKind::Color => {
                write!(f, "`{}`", self.value)
            }
            TokenKind::String => write!(f, "string \"{}\"", self.value),
            kind => write!(f, "{kind}"),
        }
    }
}
