//! Workflow graph construction.
//!
//! Turns a workflow document into renderable nodes and edges: one node per
//! workflow node, one edge per linked (source, target) pair, positioned by a
//! [`GraphLayout`]. Positions are top-left corners of the node footprint.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use ts_rs::TS;

use crate::error::CoreError;
use crate::graph_layout::{Footprint, GraphLayout, LayeredLayout, Point};
use crate::workflow_document::{is_node_graph, WorkflowDocument};

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A renderable workflow node.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct GraphNode {
    /// Workflow node id.
    pub id: String,
    /// The node's raw JSON (`class_type`, `inputs`, ...), for display.
    pub data: Value,
    /// Top-left corner of the node's footprint.
    pub position: Point,
    /// Node role label (see `NodeKind::label`), for styling.
    pub kind: String,
}

/// A directed connection `source -> target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct GraphEdge {
    /// `"{source}-{target}"`.
    pub id: String,
    pub source: String,
    pub target: String,
}

/// Nodes and edges of a workflow, ready to render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct WorkflowGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl WorkflowGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds [`WorkflowGraph`]s with a given layout engine and node footprint.
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraphBuilder<L = LayeredLayout> {
    layout: L,
    footprint: Footprint,
}

impl<L: GraphLayout> WorkflowGraphBuilder<L> {
    pub fn new(layout: L, footprint: Footprint) -> Self {
        Self { layout, footprint }
    }

    pub fn footprint(&self) -> Footprint {
        self.footprint
    }

    /// Build the graph of a document. `None` and unusable documents yield
    /// the empty graph.
    pub fn build(&self, document: Option<&Value>) -> WorkflowGraph {
        let Some(document) = document else {
            return WorkflowGraph::default();
        };

        match self.try_build(document) {
            Ok(graph) => graph,
            Err(e) => {
                tracing::warn!(error = %e, "Workflow graph build failed, using empty graph");
                WorkflowGraph::default()
            }
        }
    }

    /// Fallible form of [`build`](Self::build). Documents without workflow
    /// nodes are not an error: they yield the empty graph.
    pub fn try_build(&self, document: &Value) -> Result<WorkflowGraph, CoreError> {
        if !is_node_graph(document) {
            return Ok(WorkflowGraph::default());
        }
        let workflow = WorkflowDocument::from_value(document)?;
        self.build_from_workflow(&workflow)
    }

    /// Build the graph of an already parsed workflow.
    pub fn build_from_workflow(
        &self,
        workflow: &WorkflowDocument,
    ) -> Result<WorkflowGraph, CoreError> {
        let nodes = workflow.nodes();

        let mut seen = HashSet::new();
        let mut edge_indices = Vec::new();
        let mut edges = Vec::new();
        for (target_index, node) in nodes.iter().enumerate() {
            for link in node.links() {
                let Some(source_index) = workflow.position(&link.source_id) else {
                    continue;
                };
                if !seen.insert((source_index, target_index)) {
                    continue;
                }
                edge_indices.push((source_index, target_index));
                edges.push(GraphEdge {
                    id: format!("{}-{}", link.source_id, node.id),
                    source: link.source_id.clone(),
                    target: node.id.clone(),
                });
            }
        }

        let centers = self
            .layout
            .layout(nodes.len(), &edge_indices, self.footprint)?;
        if centers.len() != nodes.len() {
            return Err(CoreError::Layout(format!(
                "Layout returned {} positions for {} nodes",
                centers.len(),
                nodes.len()
            )));
        }

        let graph_nodes = nodes
            .iter()
            .zip(centers)
            .map(|(node, center)| GraphNode {
                id: node.id.clone(),
                data: node.raw.clone(),
                position: Point {
                    x: center.x - self.footprint.width / 2.0,
                    y: center.y - self.footprint.height / 2.0,
                },
                kind: node.kind.label().to_string(),
            })
            .collect();

        tracing::debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            dangling_links = workflow.dangling_links(),
            "Built workflow graph",
        );

        Ok(WorkflowGraph {
            nodes: graph_nodes,
            edges,
        })
    }
}

/// Build a workflow graph with the default layered layout and footprint.
pub fn build_graph(document: Option<&Value>) -> WorkflowGraph {
    WorkflowGraphBuilder::<LayeredLayout>::default().build(document)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
