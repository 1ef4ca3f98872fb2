//! Semantic resolution of a parsed document into a [`DiagramModel`].
//!
//! The builder walks the first diagram's statement tree once, expanding
//! component calls and interpolating `${var}` references, and collects nodes
//! and groups into flat arenas keyed by their qualified id. Edges and
//! `note`/`style`/`data` annotations are resolved in a final pass so they may
//! refer to nodes declared later in the file.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};
use log::{debug, trace};
use serde_json::Value;

use flowforge_core::{
    color::Color,
    error::{Diagnostic, DiagnosticCode, DiagnosticCollector},
    model::{
        ArrowKind, DiagramEdge, DiagramGroup, DiagramModel, DiagramNode, LayoutHint, ModelMeta,
        ModelSource, Style,
    },
    span::Location,
};

use crate::ast::{Component, DslDocument, EdgeStatement, Name, NodeStatement, Statement};

/// Variable bindings visible to `${var}` interpolation.
pub type Variables = HashMap<String, String>;

/// Supplies the source text of `import "path"` targets.
pub trait ImportResolver {
    /// Source text for `path`, or `None` when it cannot be found.
    fn resolve(&self, path: &str) -> Option<String>;
}

/// Builds a [`DiagramModel`] from a [`DslDocument`].
///
/// # Example
///
/// ```
/// # use flowforge_parser::{DiagramBuilder, parse_document};
/// let document = parse_document(r#"diagram "Checkout" { node cart  cart -> pay }"#);
/// let model = DiagramBuilder::new().build(&document);
///
/// assert_eq!(model.id, "checkout");
/// assert_eq!(model.edges[0].id, "cart->pay");
/// ```
#[derive(Default)]
pub struct DiagramBuilder<'r> {
    scope: Variables,
    resolver: Option<&'r dyn ImportResolver>,
}

impl<'r> DiagramBuilder<'r> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the root variable map.
    pub fn with_scope(mut self, scope: impl IntoIterator<Item = (String, String)>) -> Self {
        self.scope.extend(scope);
        self
    }

    /// Follow `import` statements through `resolver`.
    pub fn with_resolver(mut self, resolver: &'r dyn ImportResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Resolve the first diagram of `document`.
    ///
    /// Never fails: every problem becomes a diagnostic in the returned
    /// model's metadata, after the document's own lexer and parser
    /// diagnostics.
    pub fn build(&self, document: &DslDocument) -> DiagramModel {
        let mut diagnostics = DiagnosticCollector::new();
        diagnostics.extend(document.diagnostics.iter().cloned());

        let imported = self.load_imports(document, &mut diagnostics);

        let Some(diagram) = document.diagrams.first() else {
            diagnostics.emit(
                Diagnostic::warning("source does not contain a `diagram` block")
                    .with_code(DiagnosticCode::FC303)
                    .with_help("add `diagram \"Title\" { ... }`"),
            );
            let mut model = DiagramModel::empty("diagram", "", ModelSource::Dsl);
            model.meta.diagnostics = diagnostics.finish();
            return model;
        };

        for extra in &document.diagrams[1..] {
            diagnostics.emit(
                Diagnostic::info(format!(
                    "diagram `{}` is ignored; only the first diagram is built",
                    extra.id
                ))
                .with_code(DiagnosticCode::FC304)
                .at(extra.title.location)
                .with_span(extra.title.span),
            );
        }

        let mut state = BuildState::new(diagnostics);
        for component in imported
            .iter()
            .flat_map(|doc| doc.components.iter())
            .chain(document.components.iter())
        {
            state.register_component(component);
        }

        let title = state.interpolate(&diagram.title, &self.scope);
        state.walk(&diagram.body, &self.scope);
        let (nodes, edges, groups) = state.resolve();

        debug!(
            diagram = diagram.id.as_str(),
            nodes = nodes.len(),
            edges = edges.len(),
            groups = groups.len();
            "Diagram resolved"
        );

        DiagramModel {
            id: diagram.id.clone(),
            title,
            theme: state.theme,
            nodes,
            edges,
            groups,
            layout: state.layout,
            meta: ModelMeta {
                source: ModelSource::Dsl,
                diagnostics: state.diagnostics.finish(),
            },
        }
    }

    /// Parse every transitively imported file once, in breadth-first order.
    fn load_imports(
        &self,
        document: &DslDocument,
        diagnostics: &mut DiagnosticCollector,
    ) -> Vec<DslDocument> {
        let mut loaded = Vec::new();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<Name> = document
            .imports
            .iter()
            .map(|import| import.path.clone())
            .collect();

        while let Some(path) = queue.pop_front() {
            if !seen.insert(path.value.clone()) {
                continue;
            }

            let source = self
                .resolver
                .and_then(|resolver| resolver.resolve(&path.value));
            let Some(source) = source else {
                let help = if self.resolver.is_some() {
                    "check that the imported file exists"
                } else {
                    "imports need an import resolver"
                };
                diagnostics.emit(
                    Diagnostic::warning(format!("cannot resolve import `{}`", path.value))
                        .with_code(DiagnosticCode::FC340)
                        .at(path.location)
                        .with_span(path.span)
                        .with_help(help),
                );
                continue;
            };

            debug!(path = path.value.as_str(); "Loading import");
            let imported = crate::parse_document(&source);
            diagnostics.extend(imported.diagnostics.iter().cloned());
            queue.extend(imported.imports.iter().map(|import| import.path.clone()));
            loaded.push(imported);
        }

        loaded
    }
}

#[derive(Debug, Default)]
struct GroupEntry {
    label: Option<String>,
    style: Option<Style>,
    children: IndexSet<String>,
}

/// An edge whose endpoints are resolved after the walk.
#[derive(Debug)]
struct PendingEdge {
    from: String,
    to: String,
    /// Qualified id of the enclosing group, empty at the top level.
    prefix: String,
    arrow: ArrowKind,
    label: Option<String>,
    condition: Option<String>,
    style: Option<Style>,
    note: Option<String>,
    location: Location,
}

#[derive(Debug)]
enum Annotation {
    Note(String),
    Style(Style),
    Data(Value),
}

#[derive(Debug)]
struct PendingAnnotation {
    target: String,
    prefix: String,
    annotation: Annotation,
    location: Location,
}

struct BuildState<'d> {
    components: IndexMap<String, &'d Component>,
    nodes: IndexMap<String, DiagramNode>,
    groups: IndexMap<String, GroupEntry>,
    edges: Vec<PendingEdge>,
    annotations: Vec<PendingAnnotation>,
    theme: Option<String>,
    layout: Option<LayoutHint>,
    /// Qualified ids of the enclosing groups, innermost last.
    prefix: Vec<String>,
    call_stack: Vec<String>,
    diagnostics: DiagnosticCollector,
}

impl<'d> BuildState<'d> {
    fn new(diagnostics: DiagnosticCollector) -> Self {
        Self {
            components: IndexMap::new(),
            nodes: IndexMap::new(),
            groups: IndexMap::new(),
            edges: Vec::new(),
            annotations: Vec::new(),
            theme: None,
            layout: None,
            prefix: Vec::new(),
            call_stack: Vec::new(),
            diagnostics,
        }
    }

    fn warn(&mut self, code: DiagnosticCode, message: String, location: Location) {
        self.diagnostics.emit(
            Diagnostic::warning(message)
                .with_code(code)
                .at(location),
        );
    }

    fn register_component(&mut self, component: &'d Component) {
        let name = component.name.value.clone();
        if self.components.contains_key(&name) {
            self.warn(
                DiagnosticCode::FC302,
                format!("component `{name}` is defined multiple times; the last definition is used"),
                component.name.location,
            );
        }
        self.components.insert(name, component);
    }

    fn current_prefix(&self) -> String {
        self.prefix.last().cloned().unwrap_or_default()
    }

    /// Qualify a name declared at the current nesting level.
    fn qualify(&self, name: &str) -> String {
        match self.prefix.last() {
            Some(parent) => format!("{parent}.{name}"),
            None => name.to_string(),
        }
    }

    fn add_to_parent(&mut self, id: &str) {
        let Some(parent) = self.prefix.last() else {
            return;
        };
        if let Some(group) = self.groups.get_mut(parent) {
            group.children.insert(id.to_string());
        }
    }

    // ---------------------------------------------------------------
    // Interpolation
    // ---------------------------------------------------------------

    /// Substitute `${var}` references; unknown variables stay verbatim.
    fn interpolate(&mut self, name: &Name, vars: &Variables) -> String {
        self.interpolate_str(&name.value, vars, name.location)
    }

    fn interpolate_str(&mut self, text: &str, vars: &Variables, location: Location) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };

            let variable = after[..end].trim();
            match vars.get(variable) {
                Some(value) => out.push_str(value),
                None => {
                    out.push_str(&rest[start..start + end + 3]);
                    self.warn(
                        DiagnosticCode::FC300,
                        format!("unknown variable `{variable}`"),
                        location,
                    );
                }
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        out
    }

    fn interpolate_opt(&mut self, name: Option<&Name>, vars: &Variables) -> Option<String> {
        name.map(|name| self.interpolate(name, vars))
    }

    fn interpolate_style(&mut self, style: &Style, vars: &Variables, location: Location) -> Style {
        style
            .iter()
            .map(|(key, value)| (key.clone(), self.interpolate_str(value, vars, location)))
            .collect()
    }

    fn interpolate_value(&mut self, value: &Value, vars: &Variables, location: Location) -> Value {
        match value {
            Value::String(text) => Value::String(self.interpolate_str(text, vars, location)),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.interpolate_value(item, vars, location))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, item)| {
                        (
                            self.interpolate_str(key, vars, location),
                            self.interpolate_value(item, vars, location),
                        )
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    // ---------------------------------------------------------------
    // Walk
    // ---------------------------------------------------------------

    fn walk(&mut self, statements: &'d [Statement], vars: &Variables) {
        for statement in statements {
            trace!(statement:?; "Resolving statement");
            match statement {
                Statement::Node(node) => self.node(node, vars),
                Statement::Group(group) => {
                    let local = self.interpolate(&group.id, vars);
                    let id = self.qualify(&local);
                    let label = self.interpolate_opt(group.label.as_ref(), vars);
                    let style = group
                        .style
                        .as_ref()
                        .map(|style| self.interpolate_style(style, vars, group.id.location));

                    if let Some(existing) = self.groups.get_mut(&id) {
                        existing.label = label.or(existing.label.take());
                        existing.style = style.or(existing.style.take());
                        self.warn(
                            DiagnosticCode::FC311,
                            format!("group `{id}` is defined multiple times; members are merged"),
                            group.id.location,
                        );
                    } else {
                        self.groups.insert(
                            id.clone(),
                            GroupEntry {
                                label,
                                style,
                                children: IndexSet::new(),
                            },
                        );
                    }
                    self.add_to_parent(&id);

                    self.prefix.push(id);
                    self.walk(&group.body, vars);
                    self.prefix.pop();
                }
                Statement::Edge(edge) => self.edge(edge, vars),
                Statement::Use(call) => self.expand(call.component.clone(), &call.args, vars),
                Statement::Layout(layout) => {
                    let values = layout
                        .values
                        .iter()
                        .map(|value| self.interpolate(value, vars))
                        .collect();
                    self.layout = Some(LayoutHint {
                        mode: layout.mode,
                        values,
                    });
                }
                Statement::Theme(theme) => {
                    self.theme = Some(self.interpolate(&theme.name, vars));
                }
                Statement::Note(note) => {
                    let text = self.interpolate(&note.text, vars);
                    self.annotate(&note.target, Annotation::Note(text), vars);
                }
                Statement::Style(style) => {
                    let style_map =
                        self.interpolate_style(&style.style, vars, style.target.location);
                    self.annotate(&style.target, Annotation::Style(style_map), vars);
                }
                Statement::Data(data) => {
                    let value = self.interpolate_value(&data.data, vars, data.target.location);
                    self.annotate(&data.target, Annotation::Data(value), vars);
                }
            }
        }
    }

    fn node(&mut self, node: &NodeStatement, vars: &Variables) {
        let local = self.interpolate(&node.id, vars);
        let id = self.qualify(&local);
        let location = node.id.location;
        let options = &node.options;

        let color = self.interpolate_opt(options.color.as_ref(), vars);
        if let Some(Err(err)) = color.as_deref().map(Color::new) {
            self.diagnostics.emit(
                Diagnostic::warning(err.to_string())
                    .with_code(DiagnosticCode::FC301)
                    .at(options.color.as_ref().map_or(location, |name| name.location))
                    .with_help("use a CSS color such as `#3366ff` or `teal`"),
            );
        }

        let resolved = DiagramNode {
            id: id.clone(),
            label: self
                .interpolate_opt(options.label.as_ref(), vars)
                .unwrap_or_else(|| local.clone()),
            kind: self.interpolate_opt(options.kind.as_ref(), vars),
            note: self.interpolate_opt(options.note.as_ref(), vars),
            data: options
                .data
                .as_ref()
                .map(|data| self.interpolate_value(data, vars, location)),
            style: options
                .style
                .as_ref()
                .map(|style| self.interpolate_style(style, vars, location)),
            icon: self.interpolate_opt(options.icon.as_ref(), vars),
            color,
            width: options.width,
            height: options.height,
        };

        if self.nodes.contains_key(&id) {
            self.diagnostics.emit(
                Diagnostic::warning(format!("node `{id}` is defined multiple times"))
                    .with_code(DiagnosticCode::FC310)
                    .at(location)
                    .with_span(node.id.span)
                    .with_help("the later definition replaces the earlier one"),
            );
        }
        // `insert` keeps the original position of an existing key
        self.nodes.insert(id.clone(), resolved);
        self.add_to_parent(&id);
    }

    fn edge(&mut self, edge: &EdgeStatement, vars: &Variables) {
        let label = self.interpolate_opt(edge.label.as_ref(), vars);
        let condition = self.interpolate_opt(edge.condition.as_ref(), vars);
        let note = self.interpolate_opt(edge.note.as_ref(), vars);
        let style = edge
            .style
            .as_ref()
            .map(|style| self.interpolate_style(style, vars, edge.from.location));
        let prefix = self.current_prefix();

        let mut from = self.interpolate(&edge.from, vars);
        for hop in &edge.hops {
            let to = self.interpolate(&hop.to, vars);
            self.edges.push(PendingEdge {
                from,
                to: to.clone(),
                prefix: prefix.clone(),
                arrow: hop.arrow,
                label: label.clone(),
                condition: condition.clone(),
                style: style.clone(),
                note: note.clone(),
                location: edge.from.location,
            });
            from = to;
        }
    }

    /// Expand `use Name(args)` in place.
    fn expand(&mut self, name: Name, args: &[Name], vars: &Variables) {
        let Some(component) = self.components.get(&name.value).copied() else {
            self.diagnostics.emit(
                Diagnostic::error(format!("component `{}` is not defined", name.value))
                    .with_code(DiagnosticCode::FC320)
                    .at(name.location)
                    .with_span(name.span),
            );
            return;
        };

        if self.call_stack.contains(&name.value) {
            let chain = self.call_stack.join(" -> ");
            self.diagnostics.emit(
                Diagnostic::error(format!(
                    "component `{}` uses itself recursively ({chain} -> {})",
                    name.value, name.value
                ))
                .with_code(DiagnosticCode::FC321)
                .at(name.location)
                .with_span(name.span)
                .with_help("the recursive `use` is skipped"),
            );
            return;
        }

        if args.len() != component.params.len() {
            self.warn(
                DiagnosticCode::FC322,
                format!(
                    "component `{}` expects {} argument(s), got {}",
                    name.value,
                    component.params.len(),
                    args.len()
                ),
                name.location,
            );
        }

        let mut child = vars.clone();
        for (param, arg) in component.params.iter().zip(args) {
            let value = self.interpolate(arg, vars);
            child.insert(param.value.clone(), value);
        }

        self.call_stack.push(name.value);
        self.walk(&component.body, &child);
        self.call_stack.pop();
    }

    fn annotate(&mut self, target: &Name, annotation: Annotation, vars: &Variables) {
        let target_name = self.interpolate(target, vars);
        self.annotations.push(PendingAnnotation {
            target: target_name,
            prefix: self.current_prefix(),
            annotation,
            location: target.location,
        });
    }

    // ---------------------------------------------------------------
    // Final pass
    // ---------------------------------------------------------------

    /// Resolve a reference written inside the group `prefix`.
    fn resolve_reference(&self, name: &str, prefix: &str) -> String {
        if prefix.is_empty() || name.starts_with(&format!("{prefix}.")) {
            return name.to_string();
        }
        let qualified = format!("{prefix}.{name}");
        if self.nodes.contains_key(&qualified) {
            qualified
        } else {
            name.to_string()
        }
    }

    fn resolve(&mut self) -> (Vec<DiagramNode>, Vec<DiagramEdge>, Vec<DiagramGroup>) {
        self.apply_annotations();
        let edges = self.resolve_edges();

        let nodes = std::mem::take(&mut self.nodes).into_values().collect();
        let groups = std::mem::take(&mut self.groups)
            .into_iter()
            .map(|(id, entry)| DiagramGroup {
                id,
                label: entry.label,
                style: entry.style,
                children: entry.children.into_iter().collect(),
            })
            .collect();

        (nodes, edges, groups)
    }

    fn apply_annotations(&mut self) {
        let mut by_target: IndexMap<String, Vec<(Annotation, Location)>> = IndexMap::new();
        for pending in std::mem::take(&mut self.annotations) {
            let id = self.resolve_reference(&pending.target, &pending.prefix);
            if !self.nodes.contains_key(&id) {
                self.warn(
                    DiagnosticCode::FC330,
                    format!("annotation target `{}` is not a node", pending.target),
                    pending.location,
                );
                continue;
            }
            by_target
                .entry(id)
                .or_default()
                .push((pending.annotation, pending.location));
        }

        for (id, annotations) in by_target {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            for (annotation, _) in annotations {
                match annotation {
                    Annotation::Note(text) => node.note = Some(text),
                    Annotation::Style(style) => {
                        node.style.get_or_insert_with(Style::new).extend(style);
                    }
                    Annotation::Data(value) => merge_data(&mut node.data, value),
                }
            }
        }
    }

    fn resolve_edges(&mut self) -> Vec<DiagramEdge> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut edges = Vec::with_capacity(self.edges.len());

        for pending in std::mem::take(&mut self.edges) {
            let from = self.resolve_reference(&pending.from, &pending.prefix);
            let to = self.resolve_reference(&pending.to, &pending.prefix);

            if !self.nodes.contains_key(&from) {
                self.warn(
                    DiagnosticCode::FC331,
                    format!("edge source `{from}` is not a declared node"),
                    pending.location,
                );
            }
            if !self.nodes.contains_key(&to) {
                self.warn(
                    DiagnosticCode::FC332,
                    format!("edge target `{to}` is not a declared node"),
                    pending.location,
                );
            }

            let base = format!("{from}->{to}");
            let repeats = seen.entry(base.clone()).or_insert(0);
            let id = match *repeats {
                0 => base,
                n => format!("{base}#{n}"),
            };
            *repeats += 1;

            edges.push(DiagramEdge {
                id,
                from,
                to,
                label: pending.label,
                condition: pending.condition,
                style: pending.style,
                note: pending.note,
                arrow: pending.arrow,
            });
        }

        edges
    }
}

/// Objects are merged key by key; anything else replaces the old value.
fn merge_data(slot: &mut Option<Value>, value: Value) {
    match (slot, value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => existing.extend(incoming),
        (slot, value) => *slot = Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_document;

    fn build(source: &str) -> DiagramModel {
        DiagramBuilder::new().build(&parse_document(source))
    }

    fn codes(model: &DiagramModel) -> Vec<DiagnosticCode> {
        model
            .meta
            .diagnostics
            .iter()
            .filter_map(|diag| diag.code())
            .collect()
    }

    fn node_ids(model: &DiagramModel) -> Vec<&str> {
        model.nodes.iter().map(|node| node.id.as_str()).collect()
    }

    #[test]
    fn test_two_nodes_and_an_edge() {
        let model = build(r#"diagram "T" { node a label "A" node b label "B" a -> b }"#);

        assert_eq!(node_ids(&model), ["a", "b"]);
        assert_eq!(model.nodes[0].label, "A");
        assert_eq!(model.edges.len(), 1);
        assert_eq!((model.edges[0].from.as_str(), model.edges[0].to.as_str()), ("a", "b"));
        assert!(model.meta.diagnostics.is_empty(), "{:?}", model.meta.diagnostics);
    }

    #[test]
    fn test_duplicate_node_overwrites_in_place() {
        let model = build(
            r#"diagram "T" {
                node a label "first"
                node b
                node a label "second"
            }"#,
        );

        assert_eq!(node_ids(&model), ["a", "b"]);
        assert_eq!(model.nodes[0].label, "second");
        assert_eq!(codes(&model), [DiagnosticCode::FC310]);
    }

    #[test]
    fn test_dangling_edge_is_kept_with_warnings() {
        let model = build(r#"diagram "T" { node a; a -> b }"#);
        assert_eq!(model.edges.len(), 1);
        assert_eq!(codes(&model), [DiagnosticCode::FC332]);

        let model = build(r#"diagram "T" { x -> y }"#);
        assert_eq!(codes(&model), [DiagnosticCode::FC331, DiagnosticCode::FC332]);
    }

    #[test]
    fn test_group_qualifies_ids() {
        let model = build(
            r#"diagram "T" {
                group g label "Backend" {
                    node x
                    group inner { node y }
                    x -> y
                }
            }"#,
        );

        assert_eq!(node_ids(&model), ["g.x", "g.inner.y"]);
        let group = model.group("g").unwrap();
        assert_eq!(group.label.as_deref(), Some("Backend"));
        assert_eq!(group.children, ["g.x", "g.inner"]);
        assert_eq!(model.group("g.inner").unwrap().children, ["g.inner.y"]);

        // `y` is not declared at the `g` level, so it stays as written
        assert_eq!(model.edges[0].from, "g.x");
        assert_eq!(model.edges[0].to, "y");
        assert_eq!(codes(&model), [DiagnosticCode::FC332]);
    }

    #[test]
    fn test_group_edges_resolve_forward_references() {
        let model = build(
            r#"diagram "T" {
                group g {
                    a -> b
                    node a
                    node b
                }
            }"#,
        );

        assert_eq!(model.edges[0].id, "g.a->g.b");
        assert!(codes(&model).is_empty());
    }

    #[test]
    fn test_duplicate_group_merges_children() {
        let model = build(
            r#"diagram "T" {
                group g { node a }
                group g { node b node a }
            }"#,
        );

        assert_eq!(model.groups.len(), 1);
        assert_eq!(model.groups[0].children, ["g.a", "g.b"]);
        assert_eq!(codes(&model), [DiagnosticCode::FC311, DiagnosticCode::FC310]);
    }

    #[test]
    fn test_component_expansion_binds_parameters() {
        let model = build(r#"component C(n) { node ${n} } diagram "T" { use C("x") }"#);
        assert_eq!(node_ids(&model), ["x"]);
        assert!(codes(&model).is_empty());
    }

    #[test]
    fn test_component_inside_group_uses_group_prefix() {
        let model = build(
            r#"component Db(name) { node ${name} type database }
            diagram "T" { group storage { use Db("orders") } }"#,
        );
        assert_eq!(node_ids(&model), ["storage.orders"]);
        assert_eq!(model.nodes[0].kind.as_deref(), Some("database"));
    }

    #[test]
    fn test_recursive_component_terminates() {
        let model = build(r#"component Loop { node a use Loop } diagram "T" { use Loop }"#);
        assert_eq!(node_ids(&model), ["a"]);
        assert_eq!(codes(&model), [DiagnosticCode::FC321]);
    }

    #[test]
    fn test_unknown_component_and_argument_mismatch() {
        let model = build(
            r#"component Pair(a, b) { node ${a} node ${b} }
            diagram "T" { use Missing  use Pair("x") }"#,
        );

        assert_eq!(
            codes(&model),
            [DiagnosticCode::FC320, DiagnosticCode::FC322, DiagnosticCode::FC300]
        );
        // The unbound parameter stays verbatim
        assert_eq!(node_ids(&model), ["x", "${b}"]);
    }

    #[test]
    fn test_scope_seeds_variables() {
        let document = parse_document(r#"diagram "T" { node ${env}-api label "${env} API" }"#);
        let model = DiagramBuilder::new()
            .with_scope([("env".to_string(), "prod".to_string())])
            .build(&document);

        assert_eq!(node_ids(&model), ["prod-api"]);
        assert_eq!(model.nodes[0].label, "prod API");
    }

    #[test]
    fn test_annotations_apply_after_walk() {
        let model = build(
            r#"diagram "T" {
                note a "before declaration"
                style a fill red
                style a "stroke: blue"
                data a { "owner": "team-${who}" }
                node a
                note ghost "nobody home"
            }"#,
        );

        let node = model.node("a").unwrap();
        assert_eq!(node.note.as_deref(), Some("before declaration"));
        let style = node.style.as_ref().unwrap();
        assert_eq!(style.get("fill").map(String::as_str), Some("red"));
        assert_eq!(style.get("stroke").map(String::as_str), Some("blue"));
        assert_eq!(node.data.as_ref().unwrap()["owner"], "team-${who}");
        assert_eq!(codes(&model), [DiagnosticCode::FC300, DiagnosticCode::FC330]);
    }

    #[test]
    fn test_repeated_edges_get_numbered_ids() {
        let model = build(r#"diagram "T" { node a node b a -> b a -> b : "retry" }"#);
        let ids: Vec<_> = model.edges.iter().map(|edge| edge.id.as_str()).collect();
        assert_eq!(ids, ["a->b", "a->b#1"]);
        assert_eq!(model.edges[1].label.as_deref(), Some("retry"));
    }

    #[test]
    fn test_invalid_color_is_kept_with_warning() {
        let model = build(r#"diagram "T" { node a color "blurple" node b color #0af }"#);
        assert_eq!(model.nodes[0].color.as_deref(), Some("blurple"));
        assert_eq!(model.nodes[1].color.as_deref(), Some("#0af"));
        assert_eq!(codes(&model), [DiagnosticCode::FC301]);
    }

    #[test]
    fn test_missing_and_extra_diagrams() {
        let model = build("component C { node a }");
        assert!(model.nodes.is_empty());
        assert_eq!(codes(&model), [DiagnosticCode::FC303]);

        let model = build(r#"diagram "One" { node a } diagram "Two" { node b }"#);
        assert_eq!(model.id, "one");
        assert_eq!(codes(&model), [DiagnosticCode::FC304]);
    }

    #[test]
    fn test_layout_and_theme_last_wins() {
        let model = build(
            r#"diagram "T" {
                layout grid
                layout vertical 80 30
                theme light
                theme dark
            }"#,
        );
        let layout = model.layout.unwrap();
        assert_eq!(layout.mode, flowforge_core::model::LayoutMode::Vertical);
        assert_eq!(layout.values, ["80", "30"]);
        assert_eq!(model.theme.as_deref(), Some("dark"));
    }

    struct MapResolver(HashMap<&'static str, &'static str>);

    impl ImportResolver for MapResolver {
        fn resolve(&self, path: &str) -> Option<String> {
            self.0.get(path).map(|source| source.to_string())
        }
    }

    #[test]
    fn test_imports_merge_components() {
        let resolver = MapResolver(HashMap::from([
            ("lib.flow", r#"import "base.flow" component Svc(n) { node ${n} type service }"#),
            ("base.flow", r#"import "lib.flow" component Db { node db }"#),
        ]));
        let document = parse_document(
            r#"import "lib.flow"
            diagram "T" { use Svc("api") use Db }"#,
        );
        let model = DiagramBuilder::new()
            .with_resolver(&resolver)
            .build(&document);

        assert_eq!(node_ids(&model), ["api", "db"]);
        assert!(codes(&model).is_empty());
    }

    #[test]
    fn test_unresolved_import_warns() {
        let model = build(r#"import "missing.flow" diagram "T" { node a }"#);
        assert_eq!(codes(&model), [DiagnosticCode::FC340]);
        assert_eq!(model.nodes.len(), 1);
    }
}
