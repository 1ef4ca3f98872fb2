//! Mermaid flowchart text for flow graphs and diagram models.
//!
//! The output is a pure projection: nothing is validated or reordered.
//! Identifiers are reduced to `[A-Za-z0-9_]`, with a numeric suffix when two
//! ids reduce to the same text. Node labels are quoted with
//! `"` written as `#quot;`, and `|` inside edge labels is written as `#124;`.
//! Newlines in any label become `<br/>`.

use std::collections::{HashMap, HashSet};

use flowforge_core::{
    flow::{FlowEdgeKind, FlowGraph, FlowNodeKind},
    model::{ArrowKind, DiagramGroup, DiagramModel, LayoutMode},
};

const INDENT: &str = "    ";

/// Render a control-flow graph, left to right. Edges of a non-normal kind
/// are labelled with their kind unless they carry their own label.
pub fn flow_graph_to_mermaid(graph: &FlowGraph) -> String {
    let mut out = String::from("flowchart LR\n");
    let mut ids = IdTable::new(graph.nodes.iter().map(|node| node.id.as_str()));

    for node in &graph.nodes {
        let (open, close) = shape(node.kind.as_str());
        line(&mut out, 1, &node_decl(&ids.get(&node.id), &node.label, open, close));
    }

    for edge in &graph.edges {
        let label = edge.label.clone().or_else(|| {
            (edge.kind != FlowEdgeKind::Normal).then(|| edge.kind.as_str().to_string())
        });
        line(
            &mut out,
            1,
            &edge_decl(&ids.get(&edge.from), &ids.get(&edge.to), "-->", label.as_deref()),
        );
    }

    out
}

/// Render a diagram model, with groups as nested `subgraph` blocks.
///
/// Direction is `TD` for a vertical layout hint, `LR` otherwise.
pub fn diagram_to_mermaid(model: &DiagramModel) -> String {
    let direction = match model.layout.as_ref().map(|hint| hint.mode) {
        Some(LayoutMode::Vertical) => "TD",
        _ => "LR",
    };
    let mut out = format!("flowchart {direction}\n");
    let mut ids = IdTable::new(
        model
            .nodes
            .iter()
            .map(|node| node.id.as_str())
            .chain(model.groups.iter().map(|group| group.id.as_str())),
    );

    let grouped: Vec<&str> = model
        .groups
        .iter()
        .flat_map(|group| group.children.iter().map(String::as_str))
        .collect();

    for node in &model.nodes {
        if !grouped.contains(&node.id.as_str()) {
            write_model_node(&mut out, &mut ids, model, &node.id, 1);
        }
    }

    for group in model.top_level_groups() {
        write_group(&mut out, &mut ids, model, group, 1);
    }

    for edge in &model.edges {
        let arrow = match edge.arrow {
            ArrowKind::Solid => "-->",
            ArrowKind::Thick => "==>",
            ArrowKind::Dotted => "-.->",
        };
        let label = edge.label.as_deref().or(edge.condition.as_deref());
        let (from, to) = (ids.get(&edge.from), ids.get(&edge.to));
        line(&mut out, 1, &edge_decl(&from, &to, arrow, label));
    }

    out
}

fn write_group(
    out: &mut String,
    ids: &mut IdTable,
    model: &DiagramModel,
    group: &DiagramGroup,
    depth: usize,
) {
    let label = group.label.as_deref().unwrap_or(&group.id);
    line(
        out,
        depth,
        &format!(
            "subgraph {} [\"{}\"]",
            ids.get(&group.id),
            escape_label(label)
        ),
    );

    for child in &group.children {
        match model.group(child) {
            Some(nested) => write_group(out, ids, model, nested, depth + 1),
            None => write_model_node(out, ids, model, child, depth + 1),
        }
    }

    line(out, depth, "end");
}

fn write_model_node(
    out: &mut String,
    ids: &mut IdTable,
    model: &DiagramModel,
    id: &str,
    depth: usize,
) {
    let Some(node) = model.node(id) else {
        return;
    };
    let (open, close) = shape(node.kind.as_deref().unwrap_or_default());
    line(out, depth, &node_decl(&ids.get(&node.id), &node.label, open, close));
}

fn shape(kind: &str) -> (&'static str, &'static str) {
    if kind == FlowNodeKind::Condition.as_str() {
        ("{", "}")
    } else if kind == FlowNodeKind::Loop.as_str() {
        ("(", ")")
    } else if kind == FlowNodeKind::End.as_str() {
        ("[[", "]]")
    } else {
        ("[", "]")
    }
}

/// Mermaid ids for model ids, unique within one export.
///
/// Ids that are already valid keep their text; the others get the first free
/// `_2`, `_3`, ... suffix when their sanitized form is taken.
#[derive(Debug, Default)]
struct IdTable {
    assigned: HashMap<String, String>,
    taken: HashSet<String>,
}

impl IdTable {
    fn new<'a>(ids: impl Iterator<Item = &'a str>) -> Self {
        let mut table = Self::default();
        let pending: Vec<&str> = ids
            .filter(|id| {
                if sanitize_id(id) == *id && !table.taken.contains(*id) {
                    table.taken.insert(id.to_string());
                    table.assigned.insert(id.to_string(), id.to_string());
                    false
                } else {
                    true
                }
            })
            .collect();
        for id in pending {
            table.get(id);
        }
        table
    }

    fn get(&mut self, id: &str) -> String {
        if let Some(assigned) = self.assigned.get(id) {
            return assigned.clone();
        }

        let base = sanitize_id(id);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        self.taken.insert(candidate.clone());
        self.assigned.insert(id.to_string(), candidate.clone());
        candidate
    }
}

fn node_decl(id: &str, label: &str, open: &str, close: &str) -> String {
    format!("{id}{open}\"{}\"{close}", escape_label(label))
}

fn edge_decl(from: &str, to: &str, arrow: &str, label: Option<&str>) -> String {
    match label {
        Some(label) => format!("{from} {arrow} |{}| {to}", escape_edge_label(label)),
        None => format!("{from} {arrow} {to}"),
    }
}

fn line(out: &mut String, depth: usize, text: &str) {
    out.push_str(&INDENT.repeat(depth));
    out.push_str(text);
    out.push('\n');
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn escape_label(label: &str) -> String {
    label.replace('"', "#quot;").replace('\n', "<br/>")
}

fn escape_edge_label(label: &str) -> String {
    escape_label(label).replace('|', "#124;")
}
