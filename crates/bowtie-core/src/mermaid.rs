use std::collections::HashSet;

use crate::graph::{compile, node_id, BowtieGraph, Group, Node, Role, Shape};
use crate::{BowtieRecord, BowtieResult, FieldPath};

const INDENT: &str = "    ";

/// Serialize a compiled graph as a Mermaid left-to-right flowchart.
pub fn render_mermaid(graph: &BowtieGraph) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str("flowchart LR\n");

    for group in Group::ALL {
        if group.parent().is_none() {
            push_group(&mut out, graph, group, 1);
        }
    }

    for edge in &graph.edges {
        out.push_str(INDENT);
        out.push_str(&node_id(&edge.from));
        out.push_str(" --- ");
        out.push_str(&node_id(&edge.to));
        out.push('\n');
    }

    for node in &graph.nodes {
        let Some(style) = node.role().style() else {
            continue;
        };
        out.push_str(INDENT);
        out.push_str("style ");
        out.push_str(&node.id);
        out.push_str(" fill:");
        out.push_str(style.fill);
        if let Some(stroke) = style.stroke {
            out.push_str(",stroke:");
            out.push_str(stroke);
        }
        if let Some(width) = style.stroke_width {
            out.push_str(",stroke-width:");
            out.push_str(width);
        }
        if let Some(color) = style.color {
            out.push_str(",color:");
            out.push_str(color);
        }
        out.push('\n');
    }

    out.truncate(out.trim_end().len());
    out
}

/// Compile `record` and render it in one step.
pub fn record_to_mermaid(record: &BowtieRecord, words_per_line: usize) -> BowtieResult<String> {
    let graph = compile(record, words_per_line)?;
    Ok(render_mermaid(&graph))
}

/// Compact flowchart without groups or styles.
///
/// Arrows run hazard to top event, barrier to the threat it guards, threat
/// to top event, top event to consequence and consequence to its barriers.
pub fn render_outline(record: &BowtieRecord, words_per_line: usize) -> BowtieResult<String> {
    let graph = compile(record, words_per_line)?;
    let mut out = String::with_capacity(512);
    let mut declared = HashSet::new();
    out.push_str("flowchart LR\n");
    push_outline_node(&mut out, &graph, &mut declared, FieldPath::Hazard);
    out.push('\n');

    let mut arrow = |out: &mut String, from: FieldPath, to: FieldPath| {
        push_outline_node(out, &graph, &mut declared, from);
        out.push_str(" --> ");
        push_outline_node(out, &graph, &mut declared, to);
        out.push('\n');
    };

    for (i, te) in record.top_events.iter().enumerate() {
        let top = FieldPath::TopEvent(i);
        arrow(&mut out, FieldPath::Hazard, top);
        for (j, threat) in te.threats.iter().enumerate() {
            for k in 0..threat.preventive_barriers.len() {
                arrow(&mut out, FieldPath::PreventiveBarrier(i, j, k), FieldPath::Threat(i, j));
            }
            arrow(&mut out, FieldPath::Threat(i, j), top);
        }
        for (j, consequence) in te.consequences.iter().enumerate() {
            arrow(&mut out, top, FieldPath::Consequence(i, j));
            for k in 0..consequence.mitigative_barriers.len() {
                arrow(&mut out, FieldPath::Consequence(i, j), FieldPath::MitigativeBarrier(i, j, k));
            }
        }
    }

    out.truncate(out.trim_end().len());
    Ok(out)
}

/// Node id, with its label on first mention only.
fn push_outline_node(
    out: &mut String,
    graph: &BowtieGraph,
    declared: &mut HashSet<FieldPath>,
    key: FieldPath,
) {
    let Some(node) = graph.node(&key) else {
        return;
    };
    out.push_str(&node.id);
    if !declared.insert(key) {
        return;
    }
    let (open, close) = match node.role() {
        Role::Hazard => ("([", "])"),
        _ => ("[", "]"),
    };
    out.push_str(open);
    out.push_str(&node.label);
    out.push_str(close);
}

fn group_is_empty(graph: &BowtieGraph, group: Group) -> bool {
    !graph.nodes.iter().any(|n| n.role().group() == group)
        && !Group::ALL
            .iter()
            .any(|child| child.parent() == Some(group) && !group_is_empty(graph, *child))
}

fn push_group(out: &mut String, graph: &BowtieGraph, group: Group, depth: usize) {
    if group_is_empty(graph, group) {
        return;
    }
    let pad = INDENT.repeat(depth);

    out.push_str(&pad);
    out.push_str("subgraph ");
    out.push_str(group.id());
    out.push('[');
    out.push_str(group.title());
    out.push_str("]\n");

    for node in graph.nodes.iter().filter(|n| n.role().group() == group) {
        out.push_str(&pad);
        out.push_str(INDENT);
        push_node(out, node);
        out.push('\n');
    }
    for child in Group::ALL.iter().filter(|c| c.parent() == Some(group)) {
        push_group(out, graph, *child, depth + 1);
    }

    out.push_str(&pad);
    out.push_str("end\n");
}

fn push_node(out: &mut String, node: &Node) {
    let (open, close) = match node.role().shape() {
        Shape::Rounded => ("(", ")"),
        Shape::DoubleCircle => ("((", "))"),
    };
    out.push_str(&node.id);
    out.push_str(open);
    out.push_str(&node.label);
    out.push_str(close);
}
