//! Recursive-descent parser for flowchart tokens.
//!
//! This module turns the token stream from the [`lexer`](super::lexer) into a
//! [`DslDocument`]. Every parse function returns a possibly partial node and
//! records diagnostics instead of failing, so a single pass reports every
//! problem in the file. The public entry point is [`parse_tokens`].

use indexmap::IndexMap;
use log::trace;
use serde_json::Value;

use flowforge_core::{
    error::{Diagnostic, DiagnosticCode, DiagnosticCollector},
    model::{LayoutMode, Style},
};

use crate::{
    ast::{
        Component, DataStatement, Diagram, DslDocument, EdgeHop, EdgeStatement, GroupStatement,
        Import, LayoutStatement, Name, NodeOptions, NodeStatement, NoteStatement, Statement,
        StyleStatement, ThemeStatement, UseStatement,
    },
    error::ParseError,
    tokens::{Keyword, Token, TokenKind},
};

struct Parser<'a> {
    source: &'a str,
    /// Never empty.
    tokens: &'a [Token],
    pos: usize,
    diagnostics: DiagnosticCollector,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: &'a [Token]) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            diagnostics: DiagnosticCollector::new(),
        }
    }

    // ---------------------------------------------------------------
    // Cursor
    // ---------------------------------------------------------------

    /// The token under the cursor; the last token once the cursor ran off
    /// the end.
    fn current(&self) -> &'a Token {
        let tokens = self.tokens;
        &tokens[self.pos.min(tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek_kind_at(0)
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(TokenKind::Eof, |token| token.kind)
    }

    fn advance(&mut self) -> &'a Token {
        let token = self.current();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> Option<&'a Token> {
        (self.peek_kind() == kind).then(|| self.advance())
    }

    fn skip_newlines(&mut self) {
        while self.peek_kind() == TokenKind::Newline {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
        }
    }

    /// Skip to the end of the current statement, stepping over balanced
    /// brace blocks.
    fn skip_statement(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek_kind() {
                TokenKind::Eof => return,
                TokenKind::Newline | TokenKind::Semicolon | TokenKind::RightBrace if depth == 0 => {
                    return;
                }
                TokenKind::LeftBrace => depth += 1,
                TokenKind::RightBrace => depth -= 1,
                _ => {}
            }
            self.advance();
        }
    }

    /// Whether the cursor sits on the first token of a new statement.
    fn at_statement_start(&self) -> bool {
        self.statement_starts_at(0)
    }

    fn statement_starts_at(&self, offset: usize) -> bool {
        match self.peek_kind_at(offset) {
            TokenKind::Keyword(keyword) => keyword.starts_statement(),
            kind => {
                kind.is_value() && matches!(self.peek_kind_at(offset + 1), TokenKind::Arrow(_))
            }
        }
    }

    fn name(token: &Token) -> Name {
        Name::new(token.value.clone(), token.span, token.location)
    }

    // ---------------------------------------------------------------
    // Diagnostics
    // ---------------------------------------------------------------

    fn error(&mut self, code: DiagnosticCode, message: impl Into<String>, token: &Token) {
        self.diagnostics.emit(
            Diagnostic::error(message)
                .with_code(code)
                .at(token.location)
                .with_span(token.span),
        );
    }

    fn error_with_help(
        &mut self,
        code: DiagnosticCode,
        message: impl Into<String>,
        help: &str,
        token: &Token,
    ) {
        self.diagnostics.emit(
            Diagnostic::error(message)
                .with_code(code)
                .at(token.location)
                .with_span(token.span)
                .with_help(help),
        );
    }

    /// Consume a value token or report FC132 without consuming anything.
    fn expect_value(&mut self, what: &str) -> Option<Name> {
        let token = self.current();
        if token.kind.is_value() {
            self.advance();
            return Some(Self::name(token));
        }
        self.error(
            DiagnosticCode::FC132,
            format!("expected {what}, found {token}"),
            token,
        );
        None
    }

    fn expect_string(&mut self, what: &str) -> Option<Name> {
        let token = self.current();
        if token.kind == TokenKind::String {
            self.advance();
            return Some(Self::name(token));
        }
        self.error(
            DiagnosticCode::FC132,
            format!("expected {what} string, found {token}"),
            token,
        );
        None
    }

    // ---------------------------------------------------------------
    // Top level
    // ---------------------------------------------------------------

    fn document(&mut self) -> DslDocument {
        let mut document = DslDocument::default();

        loop {
            self.skip_separators();
            let token = self.current();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Keyword(Keyword::Import) => {
                    self.advance();
                    match self.expect_string("import path") {
                        Some(path) => document.imports.push(Import { path }),
                        None => self.skip_statement(),
                    }
                }
                TokenKind::Keyword(Keyword::Component) => {
                    self.advance();
                    if let Some(component) = self.component() {
                        document.components.push(component);
                    }
                }
                TokenKind::Keyword(Keyword::Diagram) => {
                    self.advance();
                    if let Some(diagram) = self.diagram(token) {
                        document.diagrams.push(diagram);
                    }
                }
                _ => {
                    self.error_with_help(
                        DiagnosticCode::FC130,
                        format!("unexpected {token} at top level"),
                        "expected `import`, `component` or `diagram`",
                        token,
                    );
                    self.advance();
                }
            }
        }

        document
    }

    /// `component Name[(params)] { ... }`, after the keyword.
    fn component(&mut self) -> Option<Component> {
        let Some(name) = self.expect_value("component name") else {
            self.skip_statement();
            return None;
        };

        let params = if self.eat(TokenKind::LeftParen).is_some() {
            self.argument_list("parameter")
        } else {
            Vec::new()
        };

        let Some(body) = self.block("component") else {
            self.skip_statement();
            return None;
        };

        Some(Component { name, params, body })
    }

    /// `diagram "Title" [id] { ... }`, after the keyword.
    fn diagram(&mut self, keyword: &Token) -> Option<Diagram> {
        let title = match self.peek_kind() {
            TokenKind::String | TokenKind::Identifier => Self::name(self.advance()),
            _ => {
                let token = self.current();
                self.error(
                    DiagnosticCode::FC132,
                    format!("expected diagram title, found {token}"),
                    token,
                );
                Name::new(String::new(), keyword.span, keyword.location)
            }
        };

        let id = match self.eat(TokenKind::Identifier) {
            Some(token) => token.value.clone(),
            None => slugify(&title.value),
        };

        let Some(body) = self.block("diagram") else {
            self.skip_statement();
            return None;
        };

        Some(Diagram { title, id, body })
    }

    /// Comma separated values up to the closing `)`; the `(` is consumed.
    fn argument_list(&mut self, what: &str) -> Vec<Name> {
        let mut items = Vec::new();

        loop {
            self.skip_newlines();
            let token = self.current();
            match token.kind {
                TokenKind::RightParen => {
                    self.advance();
                    break;
                }
                TokenKind::Comma => {
                    self.advance();
                }
                kind if kind.is_value() => {
                    self.advance();
                    items.push(Self::name(token));
                }
                TokenKind::Eof | TokenKind::LeftBrace | TokenKind::RightBrace => {
                    self.error(
                        DiagnosticCode::FC132,
                        format!("expected `)` to close the {what} list, found {token}"),
                        token,
                    );
                    break;
                }
                _ => {
                    self.error(
                        DiagnosticCode::FC131,
                        format!("unexpected {token} in {what} list"),
                        token,
                    );
                    self.advance();
                }
            }
        }

        items
    }

    /// `{ statements }`. Returns `None` when the opening brace is missing.
    fn block(&mut self, owner: &str) -> Option<Vec<Statement>> {
        self.skip_newlines();
        let Some(open) = self.eat(TokenKind::LeftBrace) else {
            let token = self.current();
            self.error(
                DiagnosticCode::FC132,
                format!("expected `{{` to open the {owner} body, found {token}"),
                token,
            );
            return None;
        };

        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            match self.peek_kind() {
                TokenKind::RightBrace => {
                    self.advance();
                    return Some(statements);
                }
                TokenKind::Eof => {
                    self.error_with_help(
                        DiagnosticCode::FC133,
                        format!("unterminated {owner} body"),
                        "add a closing `}`",
                        open,
                    );
                    return Some(statements);
                }
                _ => {
                    if let Some(statement) = self.statement() {
                        trace!(statement:?; "Parsed statement");
                        statements.push(statement);
                    }
                }
            }
        }
    }

    // ---------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------

    fn statement(&mut self) -> Option<Statement> {
        let token = self.current();
        match token.kind {
            TokenKind::Keyword(Keyword::Node) => self.node_statement(),
            TokenKind::Keyword(Keyword::Group) => self.group_statement(),
            TokenKind::Keyword(Keyword::Use) => self.use_statement(),
            TokenKind::Keyword(Keyword::Layout) => self.layout_statement(),
            TokenKind::Keyword(Keyword::Theme) => self.theme_statement(),
            TokenKind::Keyword(Keyword::Note) => self.note_statement(),
            TokenKind::Keyword(Keyword::Style) => self.style_statement(),
            TokenKind::Keyword(Keyword::Data) => self.data_statement(),
            kind if kind.is_value() && matches!(self.peek_kind_at(1), TokenKind::Arrow(_)) => {
                self.edge_statement()
            }
            _ => {
                self.error_with_help(
                    DiagnosticCode::FC131,
                    format!("unexpected {token}"),
                    "statements start with `node`, `group`, `use`, `layout`, `theme`, \
                     `note`, `style`, `data` or an edge such as `a -> b`",
                    token,
                );
                self.skip_statement();
                None
            }
        }
    }

    fn node_statement(&mut self) -> Option<Statement> {
        self.advance();
        let Some(id) = self.expect_value("node name") else {
            self.skip_statement();
            return None;
        };

        let mut options = NodeOptions::default();
        loop {
            let token = self.current();
            match token.kind {
                TokenKind::Keyword(Keyword::Label) => {
                    self.advance();
                    options.label = self.option_value(token);
                }
                TokenKind::Keyword(Keyword::Type) => {
                    self.advance();
                    options.kind = self.option_value(token);
                }
                TokenKind::Keyword(Keyword::Icon) => {
                    self.advance();
                    options.icon = self.option_value(token);
                }
                TokenKind::Keyword(Keyword::Color) => {
                    self.advance();
                    options.color = self.option_value(token);
                }
                TokenKind::Keyword(Keyword::Note) => {
                    self.advance();
                    options.note = self.option_value(token);
                }
                TokenKind::Keyword(Keyword::Style) => {
                    self.advance();
                    options.style = self.style_string(token);
                }
                TokenKind::Keyword(Keyword::Width) => {
                    self.advance();
                    options.width = self.number_value(token);
                }
                TokenKind::Keyword(Keyword::Height) => {
                    self.advance();
                    options.height = self.number_value(token);
                }
                TokenKind::Keyword(Keyword::Data) => {
                    self.advance();
                    options.data = self.data_option(token);
                }
                _ => break,
            }
        }

        Some(Statement::Node(NodeStatement { id, options }))
    }

    /// The single value following an option keyword.
    fn option_value(&mut self, option: &Token) -> Option<Name> {
        let token = self.current();
        if token.kind.is_value() {
            self.advance();
            return Some(Self::name(token));
        }
        self.error(
            DiagnosticCode::FC132,
            format!("expected a value after `{}`, found {token}", option.value),
            token,
        );
        None
    }

    fn style_string(&mut self, option: &Token) -> Option<Style> {
        let token = self.current();
        if token.kind == TokenKind::String {
            self.advance();
            return Some(parse_style_string(&token.value));
        }
        self.error_with_help(
            DiagnosticCode::FC132,
            format!("expected a style string after `{}`, found {token}", option.value),
            "write styles as \"key: value; other: value\"",
            token,
        );
        None
    }

    fn number_value(&mut self, option: &Token) -> Option<u64> {
        let token = self.current();
        if let Some(number) = (token.kind == TokenKind::Number)
            .then(|| token.value.parse::<u64>().ok())
            .flatten()
        {
            self.advance();
            return Some(number);
        }

        self.error(
            DiagnosticCode::FC132,
            format!("expected a number after `{}`, found {token}", option.value),
            token,
        );
        if token.kind.is_value() {
            self.advance();
        }
        None
    }

    fn data_option(&mut self, option: &Token) -> Option<Value> {
        if self.peek_kind() == TokenKind::LeftBrace {
            return Some(self.data_block());
        }
        let token = self.current();
        self.error(
            DiagnosticCode::FC132,
            format!("expected `{{` after `{}`, found {token}", option.value),
            token,
        );
        None
    }

    /// A brace block read verbatim from the source and parsed as JSON.
    ///
    /// Malformed or unterminated blocks yield an empty object.
    fn data_block(&mut self) -> Value {
        let open = self.advance();
        let mut depth = 1usize;

        let close = loop {
            let token = self.advance();
            match token.kind {
                TokenKind::LeftBrace => depth += 1,
                TokenKind::RightBrace => {
                    depth -= 1;
                    if depth == 0 {
                        break token;
                    }
                }
                TokenKind::Eof => {
                    self.error_with_help(
                        DiagnosticCode::FC133,
                        "unterminated data block",
                        "add a closing `}`",
                        open,
                    );
                    return Value::Object(serde_json::Map::new());
                }
                _ => {}
            }
        };

        let span = open.span.union(close.span);
        let parsed = self
            .source
            .get(span.range())
            .ok_or_else(|| "block is outside the source text".to_string())
            .and_then(|raw| serde_json::from_str::<Value>(raw).map_err(|err| err.to_string()));

        match parsed {
            Ok(value) => value,
            Err(reason) => {
                self.diagnostics.emit(
                    Diagnostic::error(format!("malformed data block: {reason}"))
                        .with_code(DiagnosticCode::FC135)
                        .at(open.location)
                        .with_span(span)
                        .with_help("data blocks must be valid JSON objects"),
                );
                Value::Object(serde_json::Map::new())
            }
        }
    }

    /// `group id [label x] [style ".."] { ... }`
    fn group_statement(&mut self) -> Option<Statement> {
        self.advance();
        let Some(id) = self.expect_value("group name") else {
            self.skip_statement();
            return None;
        };

        let mut label = None;
        let mut style = None;
        loop {
            let token = self.current();
            match token.kind {
                TokenKind::Keyword(Keyword::Label) => {
                    self.advance();
                    label = self.option_value(token);
                }
                TokenKind::Keyword(Keyword::Style) => {
                    self.advance();
                    style = self.style_string(token);
                }
                _ => break,
            }
        }

        let Some(body) = self.block("group") else {
            self.skip_statement();
            return None;
        };

        Some(Statement::Group(GroupStatement {
            id,
            label,
            style,
            body,
        }))
    }

    /// `from -> to [-> more] [: label] [when cond] [style ".."] [note ".."]`
    fn edge_statement(&mut self) -> Option<Statement> {
        let from = Self::name(self.advance());

        let mut hops = Vec::new();
        while let TokenKind::Arrow(arrow) = self.peek_kind() {
            let arrow_token = self.advance();
            let token = self.current();
            if !token.kind.is_value() {
                self.error(
                    DiagnosticCode::FC132,
                    format!(
                        "expected an edge target after `{}`, found {token}",
                        arrow_token.value
                    ),
                    token,
                );
                break;
            }
            self.advance();
            hops.push(EdgeHop {
                arrow,
                to: Self::name(token),
            });
        }

        let mut edge = EdgeStatement {
            from,
            hops,
            label: None,
            condition: None,
            style: None,
            note: None,
        };

        loop {
            let token = self.current();
            match (token.kind, self.peek_kind_at(1)) {
                (TokenKind::Colon, _) => {
                    self.advance();
                    edge.label = self.option_value(token);
                }
                (TokenKind::Keyword(Keyword::When), _) => {
                    self.advance();
                    edge.condition = self.option_value(token);
                }
                // `style x ...` and `note x ...` without a string are statements
                (TokenKind::Keyword(Keyword::Style), TokenKind::String) => {
                    self.advance();
                    edge.style = self.style_string(token);
                }
                (TokenKind::Keyword(Keyword::Note), TokenKind::String) => {
                    self.advance();
                    edge.note = self.option_value(token);
                }
                _ => break,
            }
        }

        if edge.hops.is_empty() {
            return None;
        }
        Some(Statement::Edge(edge))
    }

    /// `use Name[(args)]`
    fn use_statement(&mut self) -> Option<Statement> {
        self.advance();
        let Some(component) = self.expect_value("component name") else {
            self.skip_statement();
            return None;
        };

        let args = if self.eat(TokenKind::LeftParen).is_some() {
            self.argument_list("argument")
        } else {
            Vec::new()
        };

        Some(Statement::Use(UseStatement { component, args }))
    }

    /// `layout mode values...`
    fn layout_statement(&mut self) -> Option<Statement> {
        let keyword = Self::name(self.advance());
        let Some(mode_name) = self.expect_value("layout mode") else {
            self.skip_statement();
            return None;
        };

        let Some(mode) = LayoutMode::from_name(&mode_name.value) else {
            self.diagnostics.emit(
                Diagnostic::error(format!("unknown layout mode `{}`", mode_name.value))
                    .with_code(DiagnosticCode::FC134)
                    .at(mode_name.location)
                    .with_span(mode_name.span)
                    .with_help("expected `horizontal`, `vertical`, `grid` or `swimlane`"),
            );
            self.skip_statement();
            return None;
        };

        let mut values = Vec::new();
        while self.peek_kind().is_value() && !self.at_statement_start() {
            values.push(Self::name(self.advance()));
        }

        Some(Statement::Layout(LayoutStatement {
            keyword,
            mode,
            values,
        }))
    }

    fn theme_statement(&mut self) -> Option<Statement> {
        let keyword = self.advance();
        let Some(name) = self.option_value(keyword) else {
            self.skip_statement();
            return None;
        };
        Some(Statement::Theme(ThemeStatement { name }))
    }

    /// `note target "text"`
    fn note_statement(&mut self) -> Option<Statement> {
        let keyword = self.advance();
        let Some(target) = self.expect_value("note target") else {
            self.skip_statement();
            return None;
        };
        let Some(text) = self.option_value(keyword) else {
            self.skip_statement();
            return None;
        };
        Some(Statement::Note(NoteStatement { target, text }))
    }

    /// `style target "k: v; ..."` or `style target key value key value ...`
    fn style_statement(&mut self) -> Option<Statement> {
        self.advance();
        let Some(target) = self.expect_value("style target") else {
            self.skip_statement();
            return None;
        };

        let single_string = self.peek_kind() == TokenKind::String
            && (!self.is_style_word(self.peek_kind_at(1)) || self.statement_starts_at(1));
        if single_string {
            let token = self.advance();
            return Some(Statement::Style(StyleStatement {
                target,
                style: parse_style_string(&token.value),
            }));
        }

        let mut style = Style::new();
        while self.is_style_word(self.peek_kind()) && !self.at_statement_start() {
            let key = self.advance().value.clone();
            let value = if self.is_style_word(self.peek_kind()) && !self.at_statement_start() {
                self.advance().value.clone()
            } else {
                "true".to_string()
            };
            style.insert(key, value);
        }

        if style.is_empty() {
            let token = self.current();
            self.error(
                DiagnosticCode::FC132,
                format!("expected style declarations, found {token}"),
                token,
            );
            self.skip_statement();
            return None;
        }

        Some(Statement::Style(StyleStatement { target, style }))
    }

    /// Style keys and values may be plain values or option keywords such as
    /// `color` and `width`.
    fn is_style_word(&self, kind: TokenKind) -> bool {
        match kind {
            TokenKind::Keyword(keyword) => !keyword.starts_statement(),
            kind => kind.is_value(),
        }
    }

    /// `data target { json }`
    fn data_statement(&mut self) -> Option<Statement> {
        let keyword = self.advance();
        let Some(target) = self.expect_value("data target") else {
            self.skip_statement();
            return None;
        };
        let Some(data) = self.data_option(keyword) else {
            self.skip_statement();
            return None;
        };
        Some(Statement::Data(DataStatement { target, data }))
    }
}

/// Parse `"k: v; k2: v2"` into an ordered style map.
///
/// Declarations without a colon map to `"true"`; empty declarations are
/// ignored.
pub fn parse_style_string(text: &str) -> Style {
    let mut style = IndexMap::new();
    for declaration in text.split(';') {
        let declaration = declaration.trim();
        if declaration.is_empty() {
            continue;
        }
        match declaration.split_once(':') {
            Some((key, value)) => style.insert(key.trim().to_string(), value.trim().to_string()),
            None => style.insert(declaration.to_string(), "true".to_string()),
        };
    }
    style
}

/// Lowercase `title`, collapsing every run of other characters into `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            slug.push(ch);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("diagram");
    }
    slug
}

/// Parse a token stream produced by [`tokenize`](crate::lexer::tokenize).
///
/// `source` must be the text the tokens were produced from; data blocks are
/// read from it verbatim.
///
/// # Errors
///
/// Returns [`ParseError::EmptyTokenStream`] when `tokens` is empty. Every
/// other problem is reported in [`DslDocument::diagnostics`].
pub fn parse_tokens(source: &str, tokens: &[Token]) -> Result<DslDocument, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::EmptyTokenStream);
    }

    let mut parser = Parser::new(source, tokens);
    let mut document = parser.document();
    document.diagnostics = parser.diagnostics.finish();
    Ok(document)
}
