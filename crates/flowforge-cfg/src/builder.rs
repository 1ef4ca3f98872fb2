//! Control-flow graph construction.
//!
//! The builder walks a [`SourceUnit`] by structural recursion. Each
//! statement receives the set of pending exits that flow into it and returns
//! the exits that leave it; an exit remembers the edge kind it will be wired
//! with once its target exists. Return and throw statements leave no exits
//! and are collected separately so they can be wired to the end node.
//!
//! Enclosing `try` statements form a handler stack. A throw goes to the
//! innermost handler, which is a `catch` or a `finally`; a return goes to
//! the innermost `finally`. Paths that enter a `finally` this way leave it
//! again towards the next handler out, or the end node.

use log::{debug, info};

use flowforge_core::{
    error::{Diagnostic, DiagnosticCode, DiagnosticCollector},
    flow::{FlowEdge, FlowEdgeKind, FlowGraph, FlowMeta, FlowNode, FlowNodeKind},
    span::Location,
};

use crate::syntax::{CatchClause, LoopKind, LoopStatement, SourceUnit, Statement, StatementKind};

/// Longest label text, in characters, before it is cut with `...`.
const MAX_LABEL_CHARS: usize = 40;

/// A pending edge source.
#[derive(Debug, Clone, PartialEq)]
struct Exit {
    from: String,
    kind: FlowEdgeKind,
}

impl Exit {
    fn new(from: impl Into<String>, kind: FlowEdgeKind) -> Self {
        Self {
            from: from.into(),
            kind,
        }
    }

    fn normal(from: impl Into<String>) -> Self {
        Self::new(from, FlowEdgeKind::Normal)
    }
}

/// The exits flowing out of a built statement sequence.
///
/// An empty exit set means control never falls through: every path
/// returned or threw.
#[derive(Debug, Default)]
struct Segment {
    exits: Vec<Exit>,
}

impl Segment {
    fn from_exit(exit: Exit) -> Self {
        Self { exits: vec![exit] }
    }

    fn is_terminated(&self) -> bool {
        self.exits.is_empty()
    }
}

/// An enclosing `try` clause that intercepts terminal paths.
#[derive(Debug)]
enum Handler {
    /// Throws from the try block.
    Catch(Vec<Exit>),
    /// Returns and throws from the try block and its catch body.
    Finally(Vec<Exit>),
}

/// Builds a [`FlowGraph`] from a lowered source unit.
#[derive(Debug, Default)]
pub struct FlowBuilder {
    nodes: Vec<FlowNode>,
    edges: Vec<FlowEdge>,
    /// Exits of return and uncaught throw statements, wired to the end node.
    terminals: Vec<Exit>,
    /// Innermost last.
    handlers: Vec<Handler>,
    diagnostics: DiagnosticCollector,
}

impl FlowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(mut self, unit: &SourceUnit) -> FlowGraph {
        info!(function_name:? = unit.function_name; "Building flow graph");

        if unit.is_fallback {
            self.diagnostics.emit(
                Diagnostic::info("no function declaration found; using the top-level statements")
                    .with_code(DiagnosticCode::FC200),
            );
        }

        let start = self.add_node(FlowNodeKind::Start, "start", unit.location);
        let segment = self.block(&unit.body, Segment::from_exit(Exit::normal(&start)));

        let end = self.add_node(FlowNodeKind::End, "end", None);
        self.connect(segment.exits, &end);
        let terminals = std::mem::take(&mut self.terminals);
        self.connect(terminals, &end);

        debug!(
            nodes = self.nodes.len(),
            edges = self.edges.len();
            "Flow graph built"
        );

        FlowGraph {
            nodes: self.nodes,
            edges: self.edges,
            meta: FlowMeta {
                entry_node_id: start,
                exit_node_id: Some(end),
                function_name: unit.function_name.clone(),
                diagnostics: self.diagnostics.finish(),
            },
        }
    }

    fn add_node(
        &mut self,
        kind: FlowNodeKind,
        label: impl Into<String>,
        location: Option<Location>,
    ) -> String {
        let id = format!("n{}", self.nodes.len());
        self.nodes.push(FlowNode {
            id: id.clone(),
            kind,
            label: label.into(),
            location,
        });
        id
    }

    fn add_edge(&mut self, from: &str, to: &str, kind: FlowEdgeKind) {
        let id = format!("e{}", self.edges.len());
        self.edges.push(FlowEdge {
            id,
            from: from.to_string(),
            to: to.to_string(),
            kind,
            label: None,
        });
    }

    /// Wire every exit into `to` with the kind the exit carries.
    fn connect(&mut self, exits: Vec<Exit>, to: &str) {
        for exit in exits {
            self.add_edge(&exit.from, to, exit.kind);
        }
    }

    /// Wire every exit into `to` with `kind`, whatever the exit carried.
    fn connect_as(&mut self, exits: Vec<Exit>, to: &str, kind: FlowEdgeKind) {
        for exit in exits {
            self.add_edge(&exit.from, to, kind);
        }
    }

    /// Add a node reached from `incoming` and return it as the only exit.
    fn passthrough(
        &mut self,
        incoming: Segment,
        kind: FlowNodeKind,
        label: impl Into<String>,
        location: Option<Location>,
    ) -> String {
        let id = self.add_node(kind, label, location);
        self.connect(incoming.exits, &id);
        id
    }

    fn block(&mut self, statements: &[Statement], incoming: Segment) -> Segment {
        let mut segment = incoming;
        for (index, statement) in statements.iter().enumerate() {
            if segment.is_terminated() {
                let omitted = statements.len() - index;
                debug!(omitted; "Skipping unreachable statements");
                self.diagnostics.emit(
                    Diagnostic::info(format!(
                        "{omitted} unreachable statement{} left out of the graph",
                        if omitted == 1 { "" } else { "s" }
                    ))
                    .with_code(DiagnosticCode::FC201)
                    .at(statement.location),
                );
                break;
            }
            segment = self.statement(statement, segment);
        }
        segment
    }

    fn statement(&mut self, statement: &Statement, incoming: Segment) -> Segment {
        let location = Some(statement.location);
        match &statement.kind {
            StatementKind::If {
                test,
                consequent,
                alternate,
            } => self.if_statement(test, consequent, alternate.as_deref(), location, incoming),
            StatementKind::Loop(looping) => self.loop_statement(looping, location, incoming),
            StatementKind::Try {
                block,
                handler,
                finalizer,
            } => self.try_statement(block, handler.as_ref(), finalizer.as_deref(), location, incoming),
            StatementKind::Return { argument } => {
                let label = with_argument("return", argument.as_deref());
                let id = self.passthrough(incoming, FlowNodeKind::Statement, label, location);
                self.route_return(Exit::normal(id));
                Segment::default()
            }
            StatementKind::Throw { argument } => {
                let label = with_argument("throw", argument.as_deref());
                let id = self.passthrough(incoming, FlowNodeKind::Throw, label, location);
                self.route_throw(Exit::new(id, FlowEdgeKind::Exception));
                Segment::default()
            }
            StatementKind::Block(statements) => self.block(statements, incoming),
            StatementKind::Other { summary } => {
                let id =
                    self.passthrough(incoming, FlowNodeKind::Statement, summary.as_str(), location);
                Segment::from_exit(Exit::normal(id))
            }
        }
    }

    fn route_return(&mut self, exit: Exit) {
        let frame = self.handlers.iter_mut().rev().find_map(|handler| match handler {
            Handler::Finally(frame) => Some(frame),
            Handler::Catch(_) => None,
        });
        match frame {
            Some(frame) => frame.push(exit),
            None => self.terminals.push(exit),
        }
    }

    fn route_throw(&mut self, exit: Exit) {
        match self.handlers.last_mut() {
            Some(Handler::Catch(frame) | Handler::Finally(frame)) => frame.push(exit),
            None => self.terminals.push(exit),
        }
    }

    fn if_statement(
        &mut self,
        test: &str,
        consequent: &[Statement],
        alternate: Option<&[Statement]>,
        location: Option<Location>,
        incoming: Segment,
    ) -> Segment {
        let label = format!("if ({})", shorten(test));
        let condition = self.passthrough(incoming, FlowNodeKind::Condition, label, location);

        let taken = self.block(
            consequent,
            Segment::from_exit(Exit::new(&condition, FlowEdgeKind::True)),
        );
        let not_taken = Segment::from_exit(Exit::new(&condition, FlowEdgeKind::False));
        let not_taken = match alternate {
            Some(alternate) => self.block(alternate, not_taken),
            None => not_taken,
        };

        let mut exits = taken.exits;
        exits.extend(not_taken.exits);
        if exits.is_empty() {
            return Segment::default();
        }

        let join = self.add_node(FlowNodeKind::Statement, "end if", None);
        self.connect(exits, &join);
        Segment::from_exit(Exit::normal(join))
    }

    fn loop_statement(
        &mut self,
        looping: &LoopStatement,
        location: Option<Location>,
        mut incoming: Segment,
    ) -> Segment {
        if let Some(init) = &looping.init {
            let id = self.passthrough(incoming, FlowNodeKind::Statement, shorten(init), location);
            incoming = Segment::from_exit(Exit::normal(id));
        }

        let label = match (&looping.head, looping.kind) {
            (Some(head), LoopKind::DoWhile) => format!("do while ({})", shorten(head)),
            (Some(head), kind) => format!("{kind} ({})", shorten(head)),
            (None, LoopKind::For) => "for (;;)".to_string(),
            (None, kind) => kind.to_string(),
        };
        let header = self.passthrough(incoming, FlowNodeKind::Loop, label, location);

        let mut body = self.block(
            &looping.body,
            Segment::from_exit(Exit::new(&header, FlowEdgeKind::True)),
        );
        if let Some(update) = &looping.update {
            if !body.is_terminated() {
                let id = self.passthrough(body, FlowNodeKind::Statement, shorten(update), None);
                body = Segment::from_exit(Exit::normal(id));
            }
        }
        self.connect_as(body.exits, &header, FlowEdgeKind::Loop);

        let after = self.add_node(FlowNodeKind::Statement, "after loop", None);
        self.add_edge(&header, &after, FlowEdgeKind::False);
        Segment::from_exit(Exit::normal(after))
    }

    fn try_statement(
        &mut self,
        block: &[Statement],
        handler: Option<&CatchClause>,
        finalizer: Option<&[Statement]>,
        location: Option<Location>,
        incoming: Segment,
    ) -> Segment {
        let try_node = self.passthrough(incoming, FlowNodeKind::Try, "try", location);

        if finalizer.is_some() {
            self.handlers.push(Handler::Finally(Vec::new()));
        }
        if handler.is_some() {
            self.handlers.push(Handler::Catch(Vec::new()));
        }
        let body = self.block(block, Segment::from_exit(Exit::normal(&try_node)));
        let mut exits = body.exits;

        if let Some(handler) = handler {
            let throws = match self.handlers.pop() {
                Some(Handler::Catch(throws)) => throws,
                _ => Vec::new(),
            };
            let label = match &handler.param {
                Some(param) => format!("catch ({})", shorten(param)),
                None => "catch".to_string(),
            };
            let catch = self.add_node(FlowNodeKind::Catch, label, Some(handler.location));
            self.add_edge(&try_node, &catch, FlowEdgeKind::Exception);
            self.connect(throws, &catch);

            let caught = self.block(&handler.body, Segment::from_exit(Exit::normal(&catch)));
            exits.extend(caught.exits);
        }

        let Some(finalizer) = finalizer else {
            return Segment { exits };
        };
        let interrupted = match self.handlers.pop() {
            Some(Handler::Finally(interrupted)) => interrupted,
            _ => Vec::new(),
        };

        let finally = self.add_node(FlowNodeKind::Finally, "finally", None);
        if exits.is_empty() && interrupted.is_empty() {
            self.add_edge(&try_node, &finally, FlowEdgeKind::Finally);
        }
        let falls_through = !exits.is_empty();
        self.connect_as(exits, &finally, FlowEdgeKind::Finally);

        let returns = interrupted.iter().any(|exit| exit.kind != FlowEdgeKind::Exception);
        let throws = interrupted.iter().any(|exit| exit.kind == FlowEdgeKind::Exception);
        self.connect_as(interrupted, &finally, FlowEdgeKind::Finally);

        let done = self.block(finalizer, Segment::from_exit(Exit::normal(finally)));
        for exit in &done.exits {
            if returns {
                self.route_return(Exit::normal(&exit.from));
            }
            if throws {
                self.route_throw(Exit::new(&exit.from, FlowEdgeKind::Exception));
            }
        }

        if falls_through || !(returns || throws) {
            done
        } else {
            Segment::default()
        }
    }
}

/// Build the graph for `unit`.
pub fn build_flow_graph(unit: &SourceUnit) -> FlowGraph {
    FlowBuilder::new().build(unit)
}

fn with_argument(keyword: &str, argument: Option<&str>) -> String {
    match argument {
        Some(argument) => format!("{keyword} {}", shorten(argument)),
        None => keyword.to_string(),
    }
}

/// Collapse whitespace runs and cut long text for use in a label.
fn shorten(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(MAX_LABEL_CHARS) {
        Some((end, _)) => format!("{}...", &collapsed[..end]),
        None => collapsed,
    }
}
