//! Source front ends.
//!
//! A [`SourceParser`] turns source text into a [`SourceUnit`]. The only
//! implementation, [`TreeSitterFrontend`], uses the tree-sitter JavaScript
//! and TypeScript grammars and rejects any tree that contains error or
//! missing nodes.

use std::{fmt, str::FromStr};

use log::{debug, trace, warn};
use thiserror::Error;
use tree_sitter::{Language, LanguageError, Node, Parser};

use flowforge_core::{
    error::{Diagnostic, DiagnosticCode},
    flow::FlowGraph,
    span::Location,
};

use crate::syntax::{
    CatchClause, LoopKind, LoopStatement, SourceUnit, Statement, StatementKind,
};

/// Errors that stop a source file from being lowered.
#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("unsupported source language `{0}`")]
    UnsupportedLanguage(String),

    #[error("failed to load the {language} grammar: {source}")]
    Grammar {
        language: SourceLanguage,
        #[source]
        source: LanguageError,
    },

    #[error("the parser produced no syntax tree")]
    NoTree,

    #[error("syntax error at {location}: {message}")]
    Syntax { location: Location, message: String },
}

impl FrontendError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            FrontendError::UnsupportedLanguage(_) => DiagnosticCode::FC101,
            _ => DiagnosticCode::FC100,
        }
    }

    /// The empty graph reported in place of a real one.
    pub fn into_graph(self) -> FlowGraph {
        warn!(err:% = self; "Source could not be parsed");
        FlowGraph::empty(vec![self.to_diagnostic()])
    }

    /// The diagnostic reported in place of a graph.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = match self {
            FrontendError::Syntax { location, message } => {
                Diagnostic::error(format!("syntax error: {message}")).at(*location)
            }
            FrontendError::UnsupportedLanguage(_) => Diagnostic::error(self.to_string())
                .with_help("supported languages are `js` and `ts`"),
            _ => Diagnostic::error(self.to_string()),
        };
        diagnostic.with_code(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    JavaScript,
    TypeScript,
}

impl SourceLanguage {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceLanguage::JavaScript => "js",
            SourceLanguage::TypeScript => "ts",
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceLanguage {
    type Err = FrontendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "js" | "jsx" | "mjs" | "cjs" | "javascript" => Ok(SourceLanguage::JavaScript),
            "ts" | "tsx" | "mts" | "cts" | "typescript" => Ok(SourceLanguage::TypeScript),
            _ => Err(FrontendError::UnsupportedLanguage(s.to_string())),
        }
    }
}

/// Parse behavior shared by source front ends.
pub trait SourceParser {
    /// Lower `source` into the statement model.
    ///
    /// # Errors
    ///
    /// Returns a [`FrontendError`] when the source has syntax errors or the
    /// grammar cannot be loaded.
    fn parse(&self, source: &str) -> Result<SourceUnit, FrontendError>;
}

/// Tree-sitter based front end for JavaScript and TypeScript.
#[derive(Debug, Clone, Copy)]
pub struct TreeSitterFrontend {
    language: SourceLanguage,
    jsx: bool,
}

impl TreeSitterFrontend {
    /// `jsx` selects the TSX grammar for TypeScript; the JavaScript grammar
    /// always accepts JSX.
    pub fn new(language: SourceLanguage, jsx: bool) -> Self {
        Self { language, jsx }
    }

    pub fn language(&self) -> SourceLanguage {
        self.language
    }

    fn grammar(&self) -> Language {
        match (self.language, self.jsx) {
            (SourceLanguage::JavaScript, _) => tree_sitter_javascript::LANGUAGE.into(),
            (SourceLanguage::TypeScript, false) => {
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
            }
            (SourceLanguage::TypeScript, true) => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

impl SourceParser for TreeSitterFrontend {
    fn parse(&self, source: &str) -> Result<SourceUnit, FrontendError> {
        debug!(language = self.language.as_str(), jsx = self.jsx; "Parsing source");

        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar())
            .map_err(|err| FrontendError::Grammar {
                language: self.language,
                source: err,
            })?;
        let tree = parser.parse(source, None).ok_or(FrontendError::NoTree)?;

        let root = tree.root_node();
        if let Some(node) = first_error(root) {
            let lowering = Lowering { source };
            let message = if node.is_missing() {
                format!("missing `{}`", node.kind())
            } else {
                format!("unexpected `{}`", truncate(lowering.text(node), 24))
            };
            return Err(FrontendError::Syntax {
                location: location(node),
                message,
            });
        }

        let unit = Lowering { source }.unit(root);
        trace!(unit:?; "Lowered source");
        Ok(unit)
    }
}

/// The first error or missing node in document order.
fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn location(node: Node<'_>) -> Location {
    let point = node.start_position();
    Location::new(point.row + 1, point.column + 1)
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "function",
    "generator_function",
    "arrow_function",
];

struct Lowering<'s> {
    source: &'s str,
}

impl<'s> Lowering<'s> {
    fn text(&self, node: Node<'_>) -> &'s str {
        self.source.get(node.byte_range()).unwrap_or_default()
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<String> {
        node.child_by_field_name(field)
            .map(|child| self.text(child).trim().trim_end_matches(';').trim().to_string())
            .filter(|text| !text.is_empty())
    }

    fn unit(&self, root: Node<'_>) -> SourceUnit {
        let mut cursor = root.walk();
        let top_level: Vec<_> = root.named_children(&mut cursor).collect();

        if let Some((function, name)) = top_level.iter().find_map(|node| exported_function(*node)) {
            let function_name = name.map(|name| self.text(name).to_string());
            debug!(function_name:?; "Found function declaration");
            return SourceUnit {
                function_name,
                location: Some(location(function)),
                body: self.function_body(function),
                is_fallback: false,
            };
        }

        debug!("No function declaration, using top-level statements");
        SourceUnit {
            function_name: None,
            location: None,
            body: top_level
                .into_iter()
                .filter(|node| node.kind() != "import_statement")
                .filter_map(|node| self.statement(node))
                .collect(),
            is_fallback: true,
        }
    }

    /// The body of a function. An arrow function with an expression body
    /// returns that expression.
    fn function_body(&self, function: Node<'_>) -> Vec<Statement> {
        match function.child_by_field_name("body") {
            Some(body) if body.kind() == "statement_block" => self.statements(body),
            Some(body) => vec![Statement::new(
                StatementKind::Return {
                    argument: Some(self.text(body).trim().to_string()),
                },
                location(body),
            )],
            None => Vec::new(),
        }
    }

    /// Statements of a block, or the single statement of an unbraced body.
    fn statements(&self, node: Node<'_>) -> Vec<Statement> {
        if node.kind() != "statement_block" {
            return self.statement(node).into_iter().collect();
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        children
            .into_iter()
            .filter_map(|child| self.statement(child))
            .collect()
    }

    fn optional_statements(&self, node: Option<Node<'_>>) -> Vec<Statement> {
        node.map(|node| self.statements(node)).unwrap_or_default()
    }

    fn statement(&self, node: Node<'_>) -> Option<Statement> {
        let kind = match node.kind() {
            "comment" | "empty_statement" | "hash_bang_line" => return None,
            "if_statement" => StatementKind::If {
                test: self
                    .field_text(node, "condition")
                    .map(|test| strip_parens(&test).to_string())
                    .unwrap_or_default(),
                consequent: self.optional_statements(node.child_by_field_name("consequence")),
                alternate: node
                    .child_by_field_name("alternative")
                    .map(|clause| self.optional_statements(first_named_child(clause))),
            },
            "for_statement" => StatementKind::Loop(LoopStatement {
                kind: LoopKind::For,
                head: self.field_text(node, "condition"),
                init: self.field_text(node, "initializer"),
                update: self.field_text(node, "increment"),
                body: self.optional_statements(node.child_by_field_name("body")),
            }),
            "for_in_statement" => self.for_in(node),
            "while_statement" => StatementKind::Loop(LoopStatement {
                kind: LoopKind::While,
                head: self
                    .field_text(node, "condition")
                    .map(|test| strip_parens(&test).to_string()),
                init: None,
                update: None,
                body: self.optional_statements(node.child_by_field_name("body")),
            }),
            "do_statement" => StatementKind::Loop(LoopStatement {
                kind: LoopKind::DoWhile,
                head: self
                    .field_text(node, "condition")
                    .map(|test| strip_parens(&test).to_string()),
                init: None,
                update: None,
                body: self.optional_statements(node.child_by_field_name("body")),
            }),
            "try_statement" => StatementKind::Try {
                block: self.optional_statements(node.child_by_field_name("body")),
                handler: node.child_by_field_name("handler").map(|clause| CatchClause {
                    param: self.field_text(clause, "parameter"),
                    body: self.optional_statements(clause.child_by_field_name("body")),
                    location: location(clause),
                }),
                finalizer: node
                    .child_by_field_name("finalizer")
                    .map(|clause| self.optional_statements(clause.child_by_field_name("body"))),
            },
            "return_statement" => StatementKind::Return {
                argument: self.argument(node),
            },
            "throw_statement" => StatementKind::Throw {
                argument: self.argument(node),
            },
            "statement_block" => StatementKind::Block(self.statements(node)),
            other => StatementKind::Other {
                summary: summarize(other),
            },
        };

        Some(Statement::new(kind, location(node)))
    }

    /// `for (left in right)` and `for (left of right)`.
    fn for_in(&self, node: Node<'_>) -> StatementKind {
        let operator = self.field_text(node, "operator");
        let kind = match operator.as_deref() {
            Some("of") => LoopKind::ForOf,
            _ => LoopKind::ForIn,
        };
        let head = match (self.field_text(node, "left"), self.field_text(node, "right")) {
            (Some(left), Some(right)) => {
                let binding = match self.field_text(node, "kind") {
                    Some(kind) => format!("{kind} {left}"),
                    None => left,
                };
                Some(format!(
                    "{binding} {} {right}",
                    operator.as_deref().unwrap_or("in")
                ))
            }
            _ => None,
        };

        StatementKind::Loop(LoopStatement {
            kind,
            head,
            init: None,
            update: None,
            body: self.optional_statements(node.child_by_field_name("body")),
        })
    }

    /// The expression after `return` or `throw`.
    fn argument(&self, node: Node<'_>) -> Option<String> {
        first_named_child(node)
            .map(|child| self.text(child).trim().to_string())
            .filter(|text| !text.is_empty())
    }
}

/// The first top-level function declaration, looking inside `export`,
/// together with the node naming it.
///
/// An exported variable counts when its value is a function or an arrow
/// function; the variable names it.
fn exported_function(node: Node<'_>) -> Option<(Node<'_>, Option<Node<'_>>)> {
    match node.kind() {
        kind if FUNCTION_KINDS.contains(&kind) => declared_function(node),
        "export_statement" => {
            let declaration = node
                .child_by_field_name("declaration")
                .or_else(|| node.child_by_field_name("value"))?;
            match declaration.kind() {
                "lexical_declaration" | "variable_declaration" => bound_function(declaration),
                _ => declared_function(declaration),
            }
        }
        _ => None,
    }
}

fn declared_function(node: Node<'_>) -> Option<(Node<'_>, Option<Node<'_>>)> {
    (FUNCTION_KINDS.contains(&node.kind()) && node.child_by_field_name("body").is_some())
        .then(|| (node, node.child_by_field_name("name")))
}

/// The first declarator of `declaration` whose value is a function.
fn bound_function(declaration: Node<'_>) -> Option<(Node<'_>, Option<Node<'_>>)> {
    let mut cursor = declaration.walk();
    let declarators: Vec<_> = declaration
        .named_children(&mut cursor)
        .filter(|child| child.kind() == "variable_declarator")
        .collect();

    declarators.into_iter().find_map(|declarator| {
        let (function, _) = declarator
            .child_by_field_name("value")
            .and_then(declared_function)?;
        Some((function, declarator.child_by_field_name("name")))
    })
}

fn first_named_child(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let child = node
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment");
    child
}

fn strip_parens(text: &str) -> &str {
    text.strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .map_or(text, str::trim)
}

/// A coarse description of a statement the builder does not branch on.
fn summarize(kind: &str) -> String {
    let summary = match kind {
        "expression_statement" => "expression",
        "lexical_declaration" | "variable_declaration" => "variable declaration",
        "function_declaration" | "generator_function_declaration" => "function declaration",
        "class_declaration" | "abstract_class_declaration" => "class declaration",
        "switch_statement" => "switch",
        "break_statement" => "break",
        "continue_statement" => "continue",
        "export_statement" => "export",
        "labeled_statement" => "labeled statement",
        other => {
            return other
                .strip_suffix("_statement")
                .unwrap_or(other)
                .replace('_', " ");
        }
    };
    summary.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_js(source: &str) -> SourceUnit {
        TreeSitterFrontend::new(SourceLanguage::JavaScript, false)
            .parse(source)
            .expect("valid source")
    }

    #[test]
    fn test_language_names() {
        assert_eq!("js".parse::<SourceLanguage>().unwrap(), SourceLanguage::JavaScript);
        assert_eq!("TypeScript".parse::<SourceLanguage>().unwrap(), SourceLanguage::TypeScript);

        let err = "python".parse::<SourceLanguage>().unwrap_err();
        assert_eq!(err.code(), DiagnosticCode::FC101);
        assert_eq!(err.to_string(), "unsupported source language `python`");
    }

    #[test]
    fn test_finds_first_function() {
        let unit = parse_js("import x from 'y';\nconst a = 1;\nfunction first() { a(); }\nfunction second() {}");
        assert_eq!(unit.function_name.as_deref(), Some("first"));
        assert_eq!(unit.location, Some(Location::new(3, 1)));
        assert!(!unit.is_fallback);
        assert_eq!(unit.body.len(), 1);
    }

    #[test]
    fn test_finds_exported_function() {
        let unit = parse_js("export function handler(event) { return event; }");
        assert_eq!(unit.function_name.as_deref(), Some("handler"));
        assert!(matches!(
            &unit.body[0].kind,
            StatementKind::Return { argument: Some(argument) } if argument == "event"
        ));
    }

    #[test]
    fn test_finds_exported_arrow_function() {
        let unit = parse_js("const helper = 1;\nexport const total = (items) => { return items.length; };");
        assert_eq!(unit.function_name.as_deref(), Some("total"));
        assert_eq!(unit.location, Some(Location::new(2, 22)));
        assert!(!unit.is_fallback);
        assert_eq!(unit.body.len(), 1);
    }

    #[test]
    fn test_arrow_expression_body_returns() {
        let unit = parse_js("export let double = (x) => x * 2, other = 3;");
        assert_eq!(unit.function_name.as_deref(), Some("double"));
        assert!(matches!(
            &unit.body[..],
            [Statement { kind: StatementKind::Return { argument: Some(argument) }, .. }] if argument == "x * 2"
        ));
    }

    #[test]
    fn test_exported_value_is_not_a_function() {
        let unit = parse_js("export const limit = 10;\nrun(limit);");
        assert!(unit.is_fallback);
        assert_eq!(unit.body.len(), 2);
    }

    #[test]
    fn test_falls_back_to_top_level_statements() {
        let unit = parse_js("import a from 'a';\n// note\nlet x = 1;\nx++;\n");
        assert!(unit.is_fallback);
        assert_eq!(unit.function_name, None);

        let summaries: Vec<_> = unit
            .body
            .iter()
            .map(|statement| match &statement.kind {
                StatementKind::Other { summary } => summary.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(summaries, ["variable declaration", "expression"]);
        assert_eq!(unit.body[1].location, Location::new(4, 1));
    }

    #[test]
    fn test_lowers_control_flow() {
        let unit = parse_js(
            "function f(items) {
                if ((ready)) { go(); } else stop();
                for (let i = 0; i < 3; i++) {}
                for (const item of items) {}
                while (busy) wait();
                do { poll(); } while (again);
                try { risky(); } catch (err) { log(err); } finally { done(); }
                throw new Error('x');
            }",
        );

        let kinds = &unit.body;
        assert!(matches!(
            &kinds[0].kind,
            StatementKind::If { test, consequent, alternate: Some(alternate) }
                if test == "(ready)" && consequent.len() == 1 && alternate.len() == 1
        ));
        assert!(matches!(
            &kinds[1].kind,
            StatementKind::Loop(LoopStatement { kind: LoopKind::For, head: Some(head), init: Some(init), update: Some(update), .. })
                if head == "i < 3" && init == "let i = 0" && update == "i++"
        ));
        assert!(matches!(
            &kinds[2].kind,
            StatementKind::Loop(LoopStatement { kind: LoopKind::ForOf, head: Some(head), .. })
                if head == "const item of items"
        ));
        assert!(matches!(
            &kinds[3].kind,
            StatementKind::Loop(LoopStatement { kind: LoopKind::While, head: Some(head), body, .. })
                if head == "busy" && body.len() == 1
        ));
        assert!(matches!(
            &kinds[4].kind,
            StatementKind::Loop(LoopStatement { kind: LoopKind::DoWhile, head: Some(head), .. })
                if head == "again"
        ));
        assert!(matches!(
            &kinds[5].kind,
            StatementKind::Try { block, handler: Some(handler), finalizer: Some(finalizer) }
                if block.len() == 1 && handler.param.as_deref() == Some("err") && finalizer.len() == 1
        ));
        assert!(matches!(&kinds[6].kind, StatementKind::Throw { argument: Some(_) }));
    }

    #[test]
    fn test_syntax_error_location() {
        let err = TreeSitterFrontend::new(SourceLanguage::JavaScript, false)
            .parse("function f() {\n  if (x {\n}\n")
            .unwrap_err();

        assert!(matches!(err, FrontendError::Syntax { .. }), "got {err:?}");
        assert_eq!(err.to_diagnostic().code(), Some(DiagnosticCode::FC100));
    }

    #[test]
    fn test_typescript_and_tsx() {
        let source = "export function area(r: number): number { return Math.PI * r * r; }";
        let unit = TreeSitterFrontend::new(SourceLanguage::TypeScript, false)
            .parse(source)
            .unwrap();
        assert_eq!(unit.function_name.as_deref(), Some("area"));

        let tsx = "function View(): JSX.Element { return <div>hi</div>; }";
        let unit = TreeSitterFrontend::new(SourceLanguage::TypeScript, true)
            .parse(tsx)
            .unwrap();
        assert_eq!(unit.body.len(), 1);
    }

    #[test]
    fn test_summaries() {
        assert_eq!(summarize("expression_statement"), "expression");
        assert_eq!(summarize("switch_statement"), "switch");
        assert_eq!(summarize("interface_declaration"), "interface declaration");
    }
}
