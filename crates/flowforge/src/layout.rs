//! Layered layout for diagram models.
//!
//! Nodes are placed on levels by their longest forward-path distance from a
//! root. Back-edges found by a depth-first search are ignored while leveling,
//! so cyclic graphs such as loops are laid out by their forward structure.
//! Every node gets the same box from [`LayoutConfig`]; there is no text
//! measurement.
//!
//! The diagram's layout hint selects the arrangement:
//!
//! - `horizontal` (default): levels run left to right.
//! - `vertical`: levels run top to bottom.
//! - `grid`: nodes fill a square-ish grid in model order.
//! - `swimlane`: one lane per top-level group, ungrouped nodes last, each
//!   lane leveled on its own.
//!
//! Numeric hint values override the horizontal and vertical gaps, in that
//! order.

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, info};
use petgraph::{
    Direction,
    graph::{DiGraph, EdgeIndex, NodeIndex},
    visit::EdgeRef,
};
use serde::{Deserialize, Serialize};

use flowforge_core::model::{DiagramModel, LayoutMode};

use crate::config::LayoutConfig;

/// A node box placed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedNode {
    pub id: String,
    pub level: usize,
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Layout output: positioned nodes in model order and the canvas size.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedDiagram {
    pub nodes: Vec<PositionedNode>,
    pub width: f32,
    pub height: f32,
}

impl PositionedDiagram {
    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

/// Model nodes and their resolvable edges as a petgraph graph.
///
/// Node weights are indices into `model.nodes`; graph node indices follow
/// model order.
struct LayoutGraph {
    graph: DiGraph<usize, ()>,
}

impl LayoutGraph {
    fn new(model: &DiagramModel) -> Self {
        let mut graph = DiGraph::with_capacity(model.nodes.len(), model.edges.len());
        let mut indices = HashMap::with_capacity(model.nodes.len());
        for (position, node) in model.nodes.iter().enumerate() {
            indices.insert(node.id.as_str(), graph.add_node(position));
        }

        for edge in &model.edges {
            if let (Some(&from), Some(&to)) = (
                indices.get(edge.from.as_str()),
                indices.get(edge.to.as_str()),
            ) {
                graph.add_edge(from, to, ());
            }
        }

        Self { graph }
    }

    /// Outgoing edges of `node` in insertion order.
    fn outgoing(&self, node: NodeIndex) -> Vec<(EdgeIndex, NodeIndex)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| (edge.id(), edge.target()))
            .collect();
        edges.sort_by_key(|(edge, _)| edge.index());
        edges
    }

    /// Edges that close a cycle, found by a depth-first search over
    /// `members`.
    ///
    /// Roots without incoming edges are searched first, in model order, then
    /// any node still unvisited.
    fn back_edges(&self, members: &[NodeIndex]) -> HashSet<EdgeIndex> {
        let member_set: HashSet<_> = members.iter().copied().collect();
        let has_incoming = |node: NodeIndex| {
            self.graph
                .edges_directed(node, Direction::Incoming)
                .any(|edge| member_set.contains(&edge.source()))
        };

        let roots = members.iter().copied().filter(|node| !has_incoming(*node));
        let order: Vec<_> = roots.chain(members.iter().copied()).collect();

        let mut back_edges = HashSet::new();
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();

        for root in order {
            if !visited.insert(root) {
                continue;
            }
            on_stack.insert(root);
            let mut stack = vec![(root, self.outgoing(root), 0usize)];

            while let Some((node, edges, next)) = stack.last_mut() {
                let Some(&(edge, target)) = edges.get(*next) else {
                    on_stack.remove(&*node);
                    stack.pop();
                    continue;
                };
                *next += 1;

                if !member_set.contains(&target) {
                    continue;
                }
                if on_stack.contains(&target) {
                    back_edges.insert(edge);
                } else if visited.insert(target) {
                    on_stack.insert(target);
                    let edges = self.outgoing(target);
                    stack.push((target, edges, 0));
                }
            }
        }

        back_edges
    }

    /// Longest forward-path level of every member, by in-degree draining.
    fn levels(&self, members: &[NodeIndex]) -> HashMap<NodeIndex, usize> {
        let member_set: HashSet<_> = members.iter().copied().collect();
        let back_edges = self.back_edges(members);
        let is_forward = |edge: EdgeIndex, from: NodeIndex, to: NodeIndex| {
            !back_edges.contains(&edge) && member_set.contains(&from) && member_set.contains(&to)
        };

        let mut in_degree: HashMap<NodeIndex, usize> =
            members.iter().map(|node| (*node, 0)).collect();
        for edge in self.graph.edge_references() {
            if is_forward(edge.id(), edge.source(), edge.target()) {
                *in_degree.entry(edge.target()).or_default() += 1;
            }
        }

        let mut levels: HashMap<NodeIndex, usize> =
            members.iter().map(|node| (*node, 0)).collect();
        let mut queue: VecDeque<_> = members
            .iter()
            .copied()
            .filter(|node| in_degree.get(node) == Some(&0))
            .collect();

        while let Some(node) = queue.pop_front() {
            let level = levels.get(&node).copied().unwrap_or_default();
            for (edge, target) in self.outgoing(node) {
                if !is_forward(edge, node, target) {
                    continue;
                }
                let target_level = levels.entry(target).or_default();
                *target_level = (*target_level).max(level + 1);

                if let Some(degree) = in_degree.get_mut(&target) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(target);
                    }
                }
            }
        }

        debug!(nodes = members.len(), back_edges = back_edges.len(); "Assigned levels");
        levels
    }
}

/// Box size and spacing for one layout run.
#[derive(Clone, Copy)]
struct Grid<'c> {
    config: &'c LayoutConfig,
}

impl Grid<'_> {
    fn column_x(&self, column: usize) -> f32 {
        self.config.padding()
            + column as f32 * (self.config.node_width() + self.config.horizontal_gap())
    }

    fn row_y(&self, row: usize) -> f32 {
        self.config.padding()
            + row as f32 * (self.config.node_height() + self.config.vertical_gap())
    }

    fn rows_height(&self, rows: usize) -> f32 {
        rows as f32 * (self.config.node_height() + self.config.vertical_gap())
    }
}

/// Position every node of `model`.
///
/// Deterministic: the same model and configuration always produce the same
/// positions. Edges that reference unknown nodes are ignored.
pub fn layered_layout(model: &DiagramModel, config: &LayoutConfig) -> PositionedDiagram {
    let mode = model
        .layout
        .as_ref()
        .map_or(LayoutMode::Horizontal, |hint| hint.mode);
    let config = match &model.layout {
        Some(hint) => {
            let mut values = hint.numeric_values();
            let horizontal_gap = values.next().unwrap_or(config.horizontal_gap());
            let vertical_gap = values.next().unwrap_or(config.vertical_gap());
            config.with_gaps(horizontal_gap, vertical_gap)
        }
        None => config.clone(),
    };
    info!(nodes = model.nodes.len(), mode:% = mode; "Computing layout");

    if model.nodes.is_empty() {
        return PositionedDiagram::default();
    }

    let graph = LayoutGraph::new(model);
    let grid = Grid { config: &config };
    let all: Vec<_> = graph.graph.node_indices().collect();

    // (node, level, x, y), in no particular order
    let placed: Vec<(NodeIndex, usize, f32, f32)> = match mode {
        LayoutMode::Horizontal | LayoutMode::Vertical => {
            let levels = graph.levels(&all);
            buckets(&all, &levels)
                .iter()
                .enumerate()
                .flat_map(|(level, bucket)| {
                    bucket.iter().enumerate().map(move |(index, node)| {
                        if mode == LayoutMode::Vertical {
                            (*node, level, grid.column_x(index), grid.row_y(level))
                        } else {
                            (*node, level, grid.column_x(level), grid.row_y(index))
                        }
                    })
                })
                .collect()
        }
        LayoutMode::Grid => {
            let levels = graph.levels(&all);
            let columns = (all.len() as f64).sqrt().ceil().max(1.0) as usize;
            all.iter()
                .enumerate()
                .map(|(index, node)| {
                    let level = levels.get(node).copied().unwrap_or_default();
                    (
                        *node,
                        level,
                        grid.column_x(index % columns),
                        grid.row_y(index / columns),
                    )
                })
                .collect()
        }
        LayoutMode::Swimlane => {
            let mut placed = Vec::with_capacity(all.len());
            let mut lane_top = 0.0;
            for lane in lanes(model, &all) {
                let levels = graph.levels(&lane);
                let buckets = buckets(&lane, &levels);
                let rows = buckets.iter().map(Vec::len).max().unwrap_or_default();

                for (level, bucket) in buckets.iter().enumerate() {
                    for (index, node) in bucket.iter().enumerate() {
                        placed.push((
                            *node,
                            level,
                            grid.column_x(level),
                            lane_top + grid.row_y(index),
                        ));
                    }
                }
                lane_top += grid.rows_height(rows);
            }
            placed
        }
    };

    let mut by_node: HashMap<NodeIndex, (usize, f32, f32)> = placed
        .into_iter()
        .map(|(node, level, x, y)| (node, (level, x, y)))
        .collect();

    let nodes: Vec<_> = all
        .iter()
        .filter_map(|index| {
            let (level, x, y) = by_node.remove(index)?;
            let position = graph.graph.node_weight(*index)?;
            Some(PositionedNode {
                id: model.nodes[*position].id.clone(),
                level,
                x,
                y,
                width: config.node_width(),
                height: config.node_height(),
            })
        })
        .collect();

    let width = nodes
        .iter()
        .map(|node| node.x + node.width)
        .fold(0.0_f32, f32::max)
        + config.padding();
    let height = nodes
        .iter()
        .map(|node| node.y + node.height)
        .fold(0.0_f32, f32::max)
        + config.padding();

    debug!(width, height; "Layout computed");
    PositionedDiagram {
        nodes,
        width,
        height,
    }
}

/// Members grouped by level, each bucket in model order.
fn buckets(members: &[NodeIndex], levels: &HashMap<NodeIndex, usize>) -> Vec<Vec<NodeIndex>> {
    let mut buckets: Vec<Vec<NodeIndex>> = Vec::new();
    for node in members {
        let level = levels.get(node).copied().unwrap_or_default();
        if buckets.len() <= level {
            buckets.resize_with(level + 1, Vec::new);
        }
        buckets[level].push(*node);
    }
    buckets
}

/// Nodes per top-level group, with ungrouped nodes in a final lane.
///
/// Empty lanes are dropped.
fn lanes(model: &DiagramModel, all: &[NodeIndex]) -> Vec<Vec<NodeIndex>> {
    let mut lane_of: HashMap<&str, usize> = HashMap::new();
    let mut lane_count = 0;
    for group in model.top_level_groups() {
        let mut pending: Vec<&str> = group.children.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        while let Some(child) = pending.pop() {
            if !seen.insert(child) {
                continue;
            }
            match model.group(child) {
                Some(nested) => pending.extend(nested.children.iter().map(String::as_str)),
                None => {
                    lane_of.entry(child).or_insert(lane_count);
                }
            }
        }
        lane_count += 1;
    }

    let mut lanes = vec![Vec::new(); lane_count + 1];
    for (node, model_node) in all.iter().zip(&model.nodes) {
        let lane = lane_of
            .get(model_node.id.as_str())
            .copied()
            .unwrap_or(lane_count);
        lanes[lane].push(*node);
    }
    lanes.retain(|lane| !lane.is_empty());
    lanes
}
