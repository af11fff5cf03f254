//! Decision-tree graph: the table reshaped into nodes and labelled edges.
//!
//! Nodes and edges are stored in insertion order and referenced by index,
//! so every renderer walks them in the same order and produces the same
//! bytes for the same table.

use crate::model::table::{EbdTableMetaData, MultiStepInstruction};
use serde::Serialize;

/// Index of a node inside [`EbdGraph::nodes`].
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    Start,
    Decision {
        step_number: String,
        question: String,
    },
    Outcome {
        result_code: String,
        note: Option<String>,
    },
    End,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EbdNode {
    /// Unique key: `Start`, `Ende`, the step number or the result code.
    pub key: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EdgeKind {
    /// Start node to the first step.
    Start,
    /// The "ja" branch of a decision.
    Yes,
    /// The "nein" branch of a decision.
    No,
    /// An outcome that continues with another step.
    Transition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EbdEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EbdGraph {
    pub metadata: EbdTableMetaData,
    pub nodes: Vec<EbdNode>,
    pub edges: Vec<EbdEdge>,
    pub multi_step_instructions: Vec<MultiStepInstruction>,
}

impl EbdGraph {
    /// The start node is always inserted first.
    pub const START: NodeId = 0;

    pub fn node(&self, id: NodeId) -> &EbdNode {
        &self.nodes[id]
    }

    pub fn find(&self, key: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.key == key)
    }

    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &EbdEdge> {
        self.edges.iter().filter(move |e| e.source == id)
    }

    pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = &EbdEdge> {
        self.edges.iter().filter(move |e| e.target == id)
    }

    /// Number of decision nodes (steps).
    pub fn decision_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Decision { .. }))
            .count()
    }
}
