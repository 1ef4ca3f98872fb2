//! Control-flow graphs extracted from source code.
//!
//! A [`FlowGraph`] has exactly one `start` node and, unless the parse failed,
//! exactly one `end` node that every non-terminal path reaches. Loops add
//! back-edges so the graph is not acyclic in general.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::Diagnostic,
    model::{DiagramEdge, DiagramModel, DiagramNode, ModelSource},
    span::Location,
};

/// The role of a node in a control-flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowNodeKind {
    Start,
    Statement,
    Condition,
    Loop,
    End,
    Try,
    Catch,
    Finally,
    Throw,
}

impl FlowNodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FlowNodeKind::Start => "start",
            FlowNodeKind::Statement => "statement",
            FlowNodeKind::Condition => "condition",
            FlowNodeKind::Loop => "loop",
            FlowNodeKind::End => "end",
            FlowNodeKind::Try => "try",
            FlowNodeKind::Catch => "catch",
            FlowNodeKind::Finally => "finally",
            FlowNodeKind::Throw => "throw",
        }
    }
}

impl fmt::Display for FlowNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How control moves along a [`FlowEdge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowEdgeKind {
    #[default]
    Normal,
    True,
    False,
    Loop,
    Exception,
    Finally,
}

impl FlowEdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FlowEdgeKind::Normal => "normal",
            FlowEdgeKind::True => "true",
            FlowEdgeKind::False => "false",
            FlowEdgeKind::Loop => "loop",
            FlowEdgeKind::Exception => "exception",
            FlowEdgeKind::Finally => "finally",
        }
    }
}

impl fmt::Display for FlowEdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FlowNodeKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: FlowEdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowMeta {
    /// Id of the start node, empty for a graph without nodes.
    pub entry_node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// A control-flow graph for one function body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
    pub meta: FlowMeta,
}

impl FlowGraph {
    /// A graph without nodes carrying only `diagnostics`.
    ///
    /// This is what a fatally failed source parse produces.
    pub fn empty(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            meta: FlowMeta {
                diagnostics,
                ..FlowMeta::default()
            },
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Edges leaving `id`, in insertion order.
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a FlowEdge> + 'a {
        self.edges.iter().filter(move |edge| edge.from == id)
    }

    /// Edges entering `id`, in insertion order.
    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a FlowEdge> + 'a {
        self.edges.iter().filter(move |edge| edge.to == id)
    }

    /// Nodes of the given kind, in insertion order.
    pub fn nodes_of_kind(&self, kind: FlowNodeKind) -> impl Iterator<Item = &FlowNode> {
        self.nodes.iter().filter(move |node| node.kind == kind)
    }

    /// Adapt this graph into the shared diagram model.
    ///
    /// Node kinds become node types; edge kinds other than `normal` become
    /// edge labels unless the edge already has one.
    pub fn to_diagram_model(&self) -> DiagramModel {
        let title = self.meta.function_name.as_deref().unwrap_or("flow");
        let mut model = DiagramModel::empty(title, title, ModelSource::Code);

        model.nodes = self
            .nodes
            .iter()
            .map(|node| DiagramNode {
                kind: Some(node.kind.to_string()),
                label: node.label.clone(),
                ..DiagramNode::new(node.id.as_str())
            })
            .collect();

        model.edges = self
            .edges
            .iter()
            .map(|edge| DiagramEdge {
                id: edge.id.clone(),
                from: edge.from.clone(),
                to: edge.to.clone(),
                label: edge.label.clone().or_else(|| {
                    (edge.kind != FlowEdgeKind::Normal).then(|| edge.kind.to_string())
                }),
                ..DiagramEdge::default()
            })
            .collect();

        model.meta.diagnostics = self.meta.diagnostics.clone();
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, kind: FlowNodeKind) -> FlowNode {
        FlowNode {
            id: id.to_string(),
            kind,
            label: kind.to_string(),
            location: None,
        }
    }

    fn edge(id: &str, from: &str, to: &str, kind: FlowEdgeKind) -> FlowEdge {
        FlowEdge {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            kind,
            label: None,
        }
    }

    fn sample() -> FlowGraph {
        FlowGraph {
            nodes: vec![
                node("n0", FlowNodeKind::Start),
                node("n1", FlowNodeKind::Condition),
                node("n2", FlowNodeKind::End),
            ],
            edges: vec![
                edge("e0", "n0", "n1", FlowEdgeKind::Normal),
                edge("e1", "n1", "n2", FlowEdgeKind::True),
                edge("e2", "n1", "n2", FlowEdgeKind::False),
            ],
            meta: FlowMeta {
                entry_node_id: "n0".to_string(),
                exit_node_id: Some("n2".to_string()),
                function_name: Some("check".to_string()),
                diagnostics: Vec::new(),
            },
        }
    }

    #[test]
    fn test_empty_graph_keeps_diagnostics() {
        let graph = FlowGraph::empty(vec![Diagnostic::error("boom")]);
        assert!(graph.is_empty());
        assert_eq!(graph.meta.diagnostics.len(), 1);
        assert!(graph.meta.entry_node_id.is_empty());
    }

    #[test]
    fn test_outgoing_and_incoming() {
        let graph = sample();
        assert_eq!(graph.outgoing("n1").count(), 2);
        assert_eq!(graph.incoming("n2").count(), 2);
        assert_eq!(graph.nodes_of_kind(FlowNodeKind::Condition).count(), 1);
    }

    #[test]
    fn test_to_diagram_model_labels_branch_edges() {
        let model = sample().to_diagram_model();

        assert_eq!(model.id, "check");
        assert_eq!(model.meta.source, ModelSource::Code);
        assert_eq!(model.nodes[1].kind.as_deref(), Some("condition"));
        assert_eq!(model.edges[0].label, None);
        assert_eq!(model.edges[1].label.as_deref(), Some("true"));
        assert_eq!(model.edges[2].label.as_deref(), Some("false"));
    }

    #[test]
    fn test_serializes_kinds_as_type() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["nodes"][1]["type"], "condition");
        assert_eq!(value["edges"][2]["type"], "false");
        assert_eq!(value["meta"]["entryNodeId"], "n0");
        assert_eq!(value["meta"]["functionName"], "check");
    }
}
