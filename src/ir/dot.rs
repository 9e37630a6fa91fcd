//! Graphviz rendering of function graphs.
//!
//! Every live block becomes a cluster holding its member nodes. Data and memory edges are
//! drawn from operand to user, control edges dashed, and keep-alive edges dotted. The
//! output is meant for `dot -Tsvg`; the optimizer writes it to
//! `<dump_dir>/<function>-opt.dot` when graph dumping is enabled.

use std::fmt::Write;

use crate::{
    ir::{DependencyWalk, FunctionGraph, Mode, NodeId, Op},
    Result,
};

/// Escapes a string for use inside a quoted DOT label.
#[must_use]
pub fn escape_dot(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            '<' => escaped.push_str("\\<"),
            '>' => escaped.push_str("\\>"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn node_style(graph: &FunctionGraph, node: NodeId) -> &'static str {
    match graph.op(node) {
        Op::Const(_) => ", shape=ellipse, style=filled, fillcolor=lightyellow",
        Op::Phi => ", shape=diamond",
        Op::Bad => ", style=filled, fillcolor=lightcoral",
        Op::Start | Op::End => ", style=filled, fillcolor=lightgrey",
        _ if graph.mode(node) == Mode::Control => ", style=rounded",
        _ => "",
    }
}

/// Renders the live part of `graph` as a DOT digraph.
///
/// # Errors
///
/// Returns an error if the graph cannot be walked.
pub fn to_dot(graph: &FunctionGraph) -> Result<String> {
    let walk = DependencyWalk::run(graph)?;
    let members = graph.members_by_block(&walk.live);

    let mut dot = String::new();
    dot.push_str("digraph Function {\n");
    let _ = writeln!(dot, "    label=\"{}\";", escape_dot(graph.name()));
    dot.push_str("    labelloc=t;\n");
    dot.push_str("    compound=true;\n");
    dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");
    dot.push_str("    edge [fontname=\"Courier\", fontsize=9];\n\n");

    let blocks: Vec<NodeId> = walk
        .order
        .iter()
        .copied()
        .filter(|&n| graph.is_block(n))
        .collect();

    for &block in &blocks {
        let title = if block == graph.start_block() {
            format!("{block} (entry)")
        } else if block == graph.end_block() {
            format!("{block} (exit)")
        } else {
            block.to_string()
        };
        let _ = writeln!(dot, "    subgraph cluster_{} {{", block.index());
        let _ = writeln!(dot, "        label=\"{}\";", escape_dot(&title));
        let _ = writeln!(dot, "        {block} [label=\"Block\", shape=point];");
        for &node in members.get(&block).map_or(&[][..], Vec::as_slice) {
            let label = format!("{node}: {} {}", graph.op(node), graph.mode(node));
            let _ = writeln!(
                dot,
                "        {node} [label=\"{}\"{}];",
                escape_dot(&label),
                node_style(graph, node)
            );
        }
        dot.push_str("    }\n");
    }

    dot.push('\n');

    for &node in &walk.order {
        let is_block = graph.is_block(node);
        for (index, &operand) in graph.operands(node).iter().enumerate() {
            if !walk.live.contains(operand.index()) {
                continue;
            }
            let style = if node == graph.end() {
                "style=dotted"
            } else if is_block {
                "style=dashed, color=blue"
            } else if graph.mode(operand) == Mode::Memory {
                "color=red"
            } else {
                "color=black"
            };
            let _ = writeln!(dot, "    {operand} -> {node} [label=\"{index}\", {style}];");
        }
    }

    dot.push_str("}\n");
    Ok(dot)
}
