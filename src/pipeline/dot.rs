//! Graphviz DOT emitter.
//!
//! Labels are written as Graphviz HTML-like labels (`label=<...>`), so every
//! piece of document text goes through [`escape_html`] first. Line breaks in
//! the source text become left-aligned `<BR/>`s.

use crate::model::{EbdGraph, EbdNode, EdgeKind, NodeKind};
use std::fmt::Write;

const FONT: &str = "Roboto, sans-serif";
const EDGE_COLOR: &str = "#88a0d6";
const START_FILL: &str = "#8ba2d7";
const DECISION_FILL: &str = "#c4cac1";
const OUTCOME_FILL: &str = "#c2cee9";
const END_FILL: &str = "#8ba2d7";

/// Render the graph as a DOT digraph.
pub fn to_dot(graph: &EbdGraph) -> String {
    let mut out = String::new();
    let meta = &graph.metadata;

    out.push_str("digraph D {\n");
    out.push_str("    labelloc=\"t\";\n");
    let _ = writeln!(
        out,
        "    label=<<B>{}</B><BR align=\"left\"/><B>{}</B><BR align=\"left\"/>{}<BR align=\"left\"/>>;",
        escape_html(&meta.ebd_code),
        escape_html(&meta.ebd_name),
        escape_html(&meta.section),
    );
    for attr in [
        "ratio=\"compress\"",
        "concentrate=true",
        "pack=true",
        "rankdir=TB",
        "packmode=\"array\"",
        "size=\"20,20\"",
        "fontsize=12",
        "pad=0.25",
    ] {
        let _ = writeln!(out, "    {attr};");
    }

    for node in &graph.nodes {
        let _ = writeln!(out, "    {} {};", quote_id(&node.key), node_attributes(graph, node));
    }

    for edge in &graph.edges {
        let source = quote_id(&graph.node(edge.source).key);
        let target = quote_id(&graph.node(edge.target).key);
        match edge.kind {
            EdgeKind::Start | EdgeKind::Transition => {
                let _ = writeln!(out, "    {source} -> {target} [color=\"{EDGE_COLOR}\"];");
            }
            EdgeKind::Yes | EdgeKind::No => {
                let label = if edge.kind == EdgeKind::Yes { "JA" } else { "NEIN" };
                let _ = writeln!(
                    out,
                    "    {source} -> {target} [label=<<B>{label}</B>>, color=\"{EDGE_COLOR}\", fontname=\"{FONT}\"];"
                );
            }
        }
    }

    out.push_str("}\n");
    out
}

fn node_attributes(graph: &EbdGraph, node: &EbdNode) -> String {
    match &node.kind {
        NodeKind::Start => format!(
            "[margin=\"0.2,0.12\", shape=box, style=\"filled,rounded\", penwidth=0.0, fillcolor=\"{START_FILL}\", \
             label=<<B>{}</B><BR align=\"center\"/><FONT point-size=\"12\"><B><U>Prüfende Rolle:</U> {}</B></FONT><BR align=\"center\"/>>, \
             fontname=\"{FONT}\"]",
            escape_html(&graph.metadata.ebd_code),
            escape_html(&graph.metadata.role),
        ),
        NodeKind::Decision {
            step_number,
            question,
        } => format!(
            "[margin=\"0.2,0.12\", shape=box, style=\"filled,rounded\", penwidth=0.0, fillcolor=\"{DECISION_FILL}\", \
             label=<<B>{}: </B>{}<BR align=\"left\"/>>, fontname=\"{FONT}\"]",
            escape_html(step_number),
            escape_html(question),
        ),
        NodeKind::Outcome { result_code, note } => {
            let note = match note {
                Some(note) => format!("<FONT point-size=\"12\">{}</FONT><BR align=\"left\"/>", escape_html(note)),
                None => String::new(),
            };
            format!(
                "[margin=\"0.2,0.12\", shape=box, style=\"filled\", penwidth=0.0, fillcolor=\"{OUTCOME_FILL}\", \
                 label=<<B>{}</B><BR align=\"left\"/>{}>, fontname=\"{FONT}\"]",
                escape_html(result_code),
                note,
            )
        }
        NodeKind::End => format!(
            "[margin=\"0.2,0.12\", shape=box, style=\"filled\", penwidth=0.0, fillcolor=\"{END_FILL}\", \
             label=<Ende>, fontname=\"{FONT}\"]"
        ),
    }
}

/// Escape text for a Graphviz HTML-like label.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            out.push_str("<BR align=\"left\"/>");
        }
        for c in line.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                _ => out.push(c),
            }
        }
    }
    out
}

/// Quote a node key as a DOT ID.
fn quote_id(key: &str) -> String {
    format!("\"{}\"", key.replace('\\', "\\\\").replace('"', "\\\""))
}
