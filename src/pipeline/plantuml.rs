//! PlantUML activity-diagram emitter.
//!
//! PlantUML has no goto, so the graph is written as nested `if/else`
//! blocks. That only works for trees: every decision needs exactly one
//! "ja" and one "nein" edge, no decision may be entered from two places and
//! no outcome may continue with another step. Outcome and end nodes may be
//! shared because they are leaves and are simply repeated.

use crate::error::RenderError;
use crate::model::{EbdGraph, EdgeKind, NodeId, NodeKind};
use std::fmt::Write;

const SKINPARAMS: &[&str] = &[
    "skinparam Shadowing false",
    "skinparam NoteBorderColor #f3f1f6",
    "skinparam NoteBackgroundColor #f3f1f6",
    "skinparam NoteFontSize 12",
    "skinparam ActivityBorderColor none",
    "skinparam ActivityBackgroundColor #7a8da1",
    "skinparam ActivityFontSize 16",
    "skinparam ArrowColor #7aab8a",
    "skinparam ArrowFontSize 16",
    "skinparam ActivityDiamondBackgroundColor #7aab8a",
    "skinparam ActivityDiamondBorderColor #7aab8a",
    "skinparam ActivityDiamondFontSize 18",
    "skinparam defaultFontName DejaVu Serif Condensed",
    "skinparam ActivityEndColor #669580",
];

/// Render the graph as a PlantUML activity diagram.
///
/// # Errors
/// [`RenderError::NotExactlyTwoOutgoingEdges`] or
/// [`RenderError::GraphTooComplexForPlantuml`] when the graph is not a
/// binary tree of decisions.
pub fn to_plantuml(graph: &EbdGraph) -> Result<String, RenderError> {
    check_tree_shape(graph)?;

    let meta = &graph.metadata;
    let mut out = String::from("@startuml\n");
    for line in SKINPARAMS {
        out.push_str(line);
        out.push('\n');
    }
    let _ = writeln!(out, "header\n<b>Prüfende Rolle: {}</b>\nendheader", one_line(&meta.role));
    let _ = writeln!(
        out,
        "title\n{}: {}\n{}\nendtitle",
        one_line(&meta.ebd_code),
        one_line(&meta.ebd_name),
        one_line(&meta.section)
    );
    out.push_str("start\n");

    if let Some(first) = graph.outgoing(EbdGraph::START).next() {
        emit_node(graph, first.target, 0, &mut out);
    }

    out.push_str("@enduml\n");
    Ok(out)
}

fn check_tree_shape(graph: &EbdGraph) -> Result<(), RenderError> {
    let ebd_key = &graph.metadata.ebd_code;

    if graph.edges.iter().any(|e| e.kind == EdgeKind::Transition) {
        return Err(RenderError::GraphTooComplexForPlantuml {
            ebd_key: ebd_key.clone(),
            detail: "an outcome continues with another step".to_string(),
        });
    }

    for (id, node) in graph.nodes.iter().enumerate() {
        let NodeKind::Decision { .. } = node.kind else {
            continue;
        };
        let outgoing: Vec<_> = graph.outgoing(id).collect();
        let yes = outgoing.iter().filter(|e| e.kind == EdgeKind::Yes).count();
        let no = outgoing.iter().filter(|e| e.kind == EdgeKind::No).count();
        if outgoing.len() != 2 || yes != 1 || no != 1 {
            return Err(RenderError::NotExactlyTwoOutgoingEdges {
                node: node.key.clone(),
                count: outgoing.len(),
            });
        }
        let incoming = graph.incoming(id).count();
        if incoming > 1 {
            return Err(RenderError::GraphTooComplexForPlantuml {
                ebd_key: ebd_key.clone(),
                detail: format!("step {} is reached from {incoming} places", node.key),
            });
        }
    }
    Ok(())
}

fn emit_node(graph: &EbdGraph, id: NodeId, depth: usize, out: &mut String) {
    let indent = "    ".repeat(depth);
    match &graph.node(id).kind {
        NodeKind::Decision {
            step_number,
            question,
        } => {
            let branch = |kind: EdgeKind| {
                graph
                    .outgoing(id)
                    .find(|e| e.kind == kind)
                    .map(|e| e.target)
            };
            let _ = writeln!(
                out,
                "{indent}if (<b>{}: </b> {}) then (ja)",
                one_line(step_number),
                one_line(question)
            );
            if let Some(yes) = branch(EdgeKind::Yes) {
                emit_node(graph, yes, depth + 1, out);
            }
            let _ = writeln!(out, "{indent}else (nein)");
            if let Some(no) = branch(EdgeKind::No) {
                emit_node(graph, no, depth + 1, out);
            }
            let _ = writeln!(out, "{indent}endif");
        }
        NodeKind::Outcome { result_code, note } => {
            let _ = writeln!(out, "{indent}:{};", one_line(result_code));
            if let Some(note) = note {
                let _ = writeln!(out, "{indent}note left");
                for line in note.lines() {
                    let _ = writeln!(out, "{indent}    {}", line.trim());
                }
                let _ = writeln!(out, "{indent}endnote");
            }
            let _ = writeln!(out, "{indent}kill;");
        }
        NodeKind::End => {
            let _ = writeln!(out, "{indent}end");
        }
        NodeKind::Start => {}
    }
}

/// PlantUML statements are line based; embedded breaks become `\n`.
fn one_line(text: &str) -> String {
    text.trim().replace("\r\n", "\\n").replace('\n', "\\n")
}
