//! Data model shared by the pipeline stages.
//!
//! * [`table`] — the decision-tree table as extracted from the document;
//!   this is also the JSON artifact.
//! * [`graph`] — the directed graph derived from a table; input of the DOT,
//!   PlantUML and SVG renderers.

pub mod graph;
pub mod table;

pub use graph::{EbdEdge, EbdGraph, EbdNode, EdgeKind, NodeId, NodeKind};
pub use table::{
    EbdCheckResult, EbdTable, EbdTableMetaData, EbdTableRow, EbdTableSubRow, MultiStepInstruction,
};
