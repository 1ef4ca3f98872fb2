//! Renderer-agnostic diagram model.
//!
//! A [`DiagramModel`] is what both pipelines produce: the DSL builder emits it
//! directly and control-flow graphs are adapted into it (see
//! [`FlowGraph::to_diagram_model`](crate::flow::FlowGraph::to_diagram_model)).
//! Containment is flat: groups list the ids of their children instead of
//! owning them.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Diagnostic;

/// Ordered `key -> value` style declarations.
pub type Style = IndexMap<String, String>;

/// A complete diagram with nodes, edges, groups and build metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramModel {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    pub nodes: Vec<DiagramNode>,
    pub edges: Vec<DiagramEdge>,
    pub groups: Vec<DiagramGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutHint>,
    pub meta: ModelMeta,
}

impl DiagramModel {
    /// An empty model for the given source kind.
    pub fn empty(id: impl Into<String>, title: impl Into<String>, source: ModelSource) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            theme: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            groups: Vec::new(),
            layout: None,
            meta: ModelMeta {
                source,
                diagnostics: Vec::new(),
            },
        }
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&DiagramNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Look up a group by id.
    pub fn group(&self, id: &str) -> Option<&DiagramGroup> {
        self.groups.iter().find(|group| group.id == id)
    }

    /// Ids of groups that are not a child of any other group, in model order.
    pub fn top_level_groups(&self) -> impl Iterator<Item = &DiagramGroup> {
        self.groups.iter().filter(|group| {
            !self
                .groups
                .iter()
                .any(|parent| parent.children.iter().any(|child| *child == group.id))
        })
    }
}

/// A node of a [`DiagramModel`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramNode {
    pub id: String,
    pub label: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
}

impl DiagramNode {
    /// A node whose label is its id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            ..Self::default()
        }
    }
}

/// Visual weight of an edge, taken from the arrow used in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrowKind {
    /// `->`
    #[default]
    Solid,
    /// `=>`
    Thick,
    /// `~>`
    Dotted,
}

impl fmt::Display for ArrowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrowKind::Solid => write!(f, "->"),
            ArrowKind::Thick => write!(f, "=>"),
            ArrowKind::Dotted => write!(f, "~>"),
        }
    }
}

/// A directed edge of a [`DiagramModel`].
///
/// `from` and `to` may name nodes that do not exist; such edges are kept and
/// reported as warnings by the builder.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub arrow: ArrowKind,
}

/// A named set of nodes and nested groups.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramGroup {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,
    /// Ids of member nodes and groups, without duplicates.
    pub children: Vec<String>,
}

/// Arrangement requested by a `layout` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Horizontal,
    Vertical,
    Grid,
    Swimlane,
}

impl LayoutMode {
    /// Parse a mode name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "horizontal" => Some(LayoutMode::Horizontal),
            "vertical" => Some(LayoutMode::Vertical),
            "grid" => Some(LayoutMode::Grid),
            "swimlane" => Some(LayoutMode::Swimlane),
            _ => None,
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayoutMode::Horizontal => "horizontal",
            LayoutMode::Vertical => "vertical",
            LayoutMode::Grid => "grid",
            LayoutMode::Swimlane => "swimlane",
        };
        f.write_str(name)
    }
}

/// Layout mode plus the raw values that followed it in the source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutHint {
    pub mode: LayoutMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl LayoutHint {
    /// The values that parse as numbers, in order.
    pub fn numeric_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.values.iter().filter_map(|value| value.parse().ok())
    }
}

/// Which pipeline produced a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSource {
    Dsl,
    Code,
}

/// Build metadata carried by every model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMeta {
    pub source: ModelSource,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}
