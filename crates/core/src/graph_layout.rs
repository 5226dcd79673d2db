//! Graph layout.
//!
//! [`GraphLayout`] is the seam between the graph builder and whatever
//! places nodes. [`LayeredLayout`] is the built-in implementation: a
//! left-to-right layered (dagre) layout computed by `dugong`.

use dugong::graphlib::{Graph, GraphOptions};
use dugong::{EdgeLabel, GraphLabel, NodeLabel, RankDir};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;

/// Default node footprint width in pixels.
pub const DEFAULT_NODE_WIDTH: f64 = 320.0;

/// Default node footprint height in pixels.
pub const DEFAULT_NODE_HEIGHT: f64 = 140.0;

/// Default gap between nodes of one rank.
pub const DEFAULT_NODE_SEP: f64 = 50.0;

/// Default gap between ranks.
pub const DEFAULT_RANK_SEP: f64 = 50.0;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A position in layout space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Display size given to every node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub width: f64,
    pub height: f64,
}

impl Default for Footprint {
    fn default() -> Self {
        Self {
            width: DEFAULT_NODE_WIDTH,
            height: DEFAULT_NODE_HEIGHT,
        }
    }
}

/// Places the nodes of a directed graph.
///
/// Nodes are identified by index `0..node_count`; edges are `(source,
/// target)` index pairs. Implementations return one **center** point per
/// node, in index order.
pub trait GraphLayout {
    fn layout(
        &self,
        node_count: usize,
        edges: &[(usize, usize)],
        footprint: Footprint,
    ) -> Result<Vec<Point>, CoreError>;
}

/// Left-to-right layered layout.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayeredLayout {
    /// Gap between nodes in the same rank.
    pub node_sep: f64,
    /// Gap between adjacent ranks.
    pub rank_sep: f64,
}

impl Default for LayeredLayout {
    fn default() -> Self {
        Self {
            node_sep: DEFAULT_NODE_SEP,
            rank_sep: DEFAULT_RANK_SEP,
        }
    }
}

impl GraphLayout for LayeredLayout {
    fn layout(
        &self,
        node_count: usize,
        edges: &[(usize, usize)],
        footprint: Footprint,
    ) -> Result<Vec<Point>, CoreError> {
        if node_count == 0 {
            return Ok(Vec::new());
        }
        if let Some(&(source, target)) = edges
            .iter()
            .find(|&&(s, t)| s >= node_count || t >= node_count)
        {
            return Err(CoreError::Layout(format!(
                "Edge {source}->{target} references a node outside 0..{node_count}"
            )));
        }

        let mut graph = self.layout_graph(node_count, edges, footprint);
        dugong::layout_dagreish(&mut graph);

        (0..node_count)
            .map(|index| {
                let id = index.to_string();
                match graph.node(&id).map(|node| (node.x, node.y)) {
                    Some((Some(x), Some(y))) => Ok(Point { x, y }),
                    _ => Err(CoreError::Layout(format!("Node {index} was not positioned"))),
                }
            })
            .collect()
    }
}

impl LayeredLayout {
    /// Dagre input graph: nodes named by index, self loops dropped.
    fn layout_graph(
        &self,
        node_count: usize,
        edges: &[(usize, usize)],
        footprint: Footprint,
    ) -> Graph<NodeLabel, EdgeLabel, GraphLabel> {
        let mut graph: Graph<NodeLabel, EdgeLabel, GraphLabel> = Graph::new(GraphOptions {
            multigraph: false,
            compound: false,
            directed: true,
        });
        graph.set_graph(GraphLabel {
            rankdir: RankDir::LR,
            nodesep: self.node_sep,
            ranksep: self.rank_sep,
            marginx: 0.0,
            marginy: 0.0,
            ..Default::default()
        });

        for index in 0..node_count {
            graph.set_node(
                index.to_string(),
                NodeLabel {
                    width: footprint.width,
                    height: footprint.height,
                    ..Default::default()
                },
            );
        }

        for &(source, target) in edges.iter().filter(|(s, t)| s != t) {
            graph.set_edge_named(
                source.to_string(),
                target.to_string(),
                None::<String>,
                Some(EdgeLabel {
                    minlen: 1,
                    weight: 1.0,
                    ..Default::default()
                }),
            );
        }

        graph
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
