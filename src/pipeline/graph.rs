//! Graph building: [`EbdTable`] → [`EbdGraph`].
//!
//! Every step becomes a decision node with a "ja" and a "nein" edge. An
//! edge ends at
//!
//! * the decision node of the subsequent step, or
//! * the outcome node of its result code (one node per code, shared by all
//!   steps that produce it), or
//! * the single "Ende" node when neither is given.
//!
//! A sub row with both a code and a subsequent step produces
//! `decision → outcome → decision`, the last edge being a transition.
//!
//! The table is validated before anything is built so a broken table never
//! yields a half-connected graph.

use crate::error::GraphBuildError;
use crate::model::{
    EbdEdge, EbdGraph, EbdNode, EbdTable, EbdTableSubRow, EdgeKind, NodeId, NodeKind,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

static RE_EBD_REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^E_\d{4}$").unwrap());

/// Key of the start node.
pub const START_KEY: &str = "Start";

/// Key of the shared end node.
pub const END_KEY: &str = "Ende";

/// Convert one table into its decision graph.
///
/// # Errors
/// Any [`GraphBuildError`] when the table is structurally inconsistent.
pub fn build_graph(table: &EbdTable) -> Result<EbdGraph, GraphBuildError> {
    validate(table)?;

    let mut builder = GraphBuilder::new(table);
    let first = builder.decision(0);
    builder.edge(EbdGraph::START, first, EdgeKind::Start);

    for (row_index, row) in table.rows.iter().enumerate() {
        let source = builder.decision(row_index);
        // "ja" before "nein", whatever order the document used
        let mut sub_rows: Vec<&EbdTableSubRow> = row.sub_rows.iter().collect();
        sub_rows.sort_by_key(|s| !s.check_result.result);

        for sub_row in sub_rows {
            let kind = if sub_row.check_result.result {
                EdgeKind::Yes
            } else {
                EdgeKind::No
            };
            let next = sub_row
                .check_result
                .subsequent_step_number
                .as_deref()
                .and_then(|step| table.rows.iter().position(|r| r.step_number == step))
                .map(|i| builder.decision(i));

            let target = match (&sub_row.result_code, next) {
                (Some(code), next) => {
                    let outcome = builder.outcome(code, sub_row.note.as_deref());
                    if let Some(next) = next {
                        builder.edge(outcome, next, EdgeKind::Transition);
                    }
                    outcome
                }
                (None, Some(next)) => next,
                (None, None) => builder.end(),
            };
            builder.edge(source, target, kind);
        }
    }

    let graph = builder.finish();
    for (id, node) in graph.nodes.iter().enumerate() {
        if id != EbdGraph::START && graph.incoming(id).next().is_none() {
            debug!(
                "{}: node {} is unreachable",
                graph.metadata.ebd_code, node.key
            );
        }
    }
    Ok(graph)
}

fn validate(table: &EbdTable) -> Result<(), GraphBuildError> {
    let ebd_key = &table.metadata.ebd_code;
    if table.rows.is_empty() {
        return Err(GraphBuildError::EmptyTable {
            ebd_key: ebd_key.clone(),
        });
    }

    // decision nodes are keyed by step number
    let mut steps = HashSet::new();
    if let Some(row) = table.rows.iter().find(|r| !steps.insert(r.step_number.as_str())) {
        return Err(GraphBuildError::DuplicateStep {
            ebd_key: ebd_key.clone(),
            step: row.step_number.clone(),
        });
    }

    // code → (note, subsequent step) of its first use
    let mut outcomes: HashMap<&str, (Option<&str>, Option<&str>)> = HashMap::new();

    for row in &table.rows {
        for sub_row in &row.sub_rows {
            let target = sub_row.check_result.subsequent_step_number.as_deref();

            if let Some(target) = target {
                if RE_EBD_REFERENCE.is_match(target) {
                    return Err(GraphBuildError::CrossReferenceNotSupported {
                        ebd_key: ebd_key.clone(),
                        from_step: row.step_number.clone(),
                        target: target.to_string(),
                    });
                }
                if table.row(target).is_none() {
                    return Err(GraphBuildError::DanglingReference {
                        ebd_key: ebd_key.clone(),
                        from_step: row.step_number.clone(),
                        target: target.to_string(),
                    });
                }
            }

            let Some(code) = sub_row.result_code.as_deref() else {
                continue;
            };
            if code.eq_ignore_ascii_case(END_KEY) {
                return Err(GraphBuildError::EndeInWrongColumn {
                    ebd_key: ebd_key.clone(),
                    step: row.step_number.clone(),
                });
            }
            let seen = (sub_row.note.as_deref(), target);
            match outcomes.get(code) {
                None => {
                    outcomes.insert(code, seen);
                }
                Some(first) if first.0 != seen.0 => {
                    return Err(GraphBuildError::OutcomeCodeAmbiguous {
                        ebd_key: ebd_key.clone(),
                        result_code: code.to_string(),
                        detail: format!("different notes at step {}", row.step_number),
                    });
                }
                Some(first) if first.1 != seen.1 => {
                    return Err(GraphBuildError::OutcomeCodeAmbiguous {
                        ebd_key: ebd_key.clone(),
                        result_code: code.to_string(),
                        detail: format!("different follow-up steps at step {}", row.step_number),
                    });
                }
                Some(_) => {}
            }
        }
    }

    Ok(())
}

/// Incremental graph construction with key → node lookup.
struct GraphBuilder<'a> {
    table: &'a EbdTable,
    nodes: Vec<EbdNode>,
    edges: Vec<EbdEdge>,
    index: HashMap<String, NodeId>,
}

impl<'a> GraphBuilder<'a> {
    fn new(table: &'a EbdTable) -> Self {
        let mut builder = Self {
            table,
            nodes: Vec::new(),
            edges: Vec::new(),
            index: HashMap::new(),
        };
        builder.node(START_KEY, NodeKind::Start);
        builder
    }

    fn node(&mut self, key: &str, kind: NodeKind) -> NodeId {
        if let Some(&id) = self.index.get(key) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(EbdNode {
            key: key.to_string(),
            kind,
        });
        self.index.insert(key.to_string(), id);
        id
    }

    fn decision(&mut self, row_index: usize) -> NodeId {
        let row = &self.table.rows[row_index];
        self.node(
            &row.step_number,
            NodeKind::Decision {
                step_number: row.step_number.clone(),
                question: row.description.clone(),
            },
        )
    }

    fn outcome(&mut self, code: &str, note: Option<&str>) -> NodeId {
        self.node(
            code,
            NodeKind::Outcome {
                result_code: code.to_string(),
                note: note.map(str::to_string),
            },
        )
    }

    fn end(&mut self) -> NodeId {
        self.node(END_KEY, NodeKind::End)
    }

    fn edge(&mut self, source: NodeId, target: NodeId, kind: EdgeKind) {
        let edge = EbdEdge {
            source,
            target,
            kind,
        };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    fn finish(self) -> EbdGraph {
        EbdGraph {
            metadata: self.table.metadata.clone(),
            nodes: self.nodes,
            edges: self.edges,
            multi_step_instructions: self
                .table
                .multi_step_instructions
                .clone()
                .unwrap_or_default(),
        }
    }
}
