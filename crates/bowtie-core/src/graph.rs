//! In-memory bowtie graph.
//!
//! A record is compiled into an ordered list of nodes and typed edges with
//! fixed styling. Serialization to diagram text lives in [`crate::mermaid`],
//! so topology can be checked here without comparing strings.

use crate::validate::renderability_problem;
use crate::wrap::wrap_text;
use crate::{BowtieError, BowtieRecord, BowtieResult, FieldPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Hazard,
    TopEvent,
    Threat,
    PreventiveBarrier,
    Consequence,
    MitigativeBarrier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Rounded,
    DoubleCircle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub fill: &'static str,
    pub stroke: Option<&'static str>,
    pub stroke_width: Option<&'static str>,
    pub color: Option<&'static str>,
}

/// Cluster a node is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Hazard,
    TopEvents,
    Threats,
    PreventiveBarriers,
    Consequences,
    MitigativeBarriers,
}

impl Group {
    pub const ALL: [Group; 6] = [
        Group::Hazard,
        Group::TopEvents,
        Group::Threats,
        Group::PreventiveBarriers,
        Group::Consequences,
        Group::MitigativeBarriers,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Group::Hazard => "Hazard",
            Group::TopEvents => "TopEvents",
            Group::Threats => "Threats",
            Group::PreventiveBarriers => "PreventiveBarriers",
            Group::Consequences => "Consequences",
            Group::MitigativeBarriers => "MitigativeBarriers",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Group::Hazard => "Hazard",
            Group::TopEvents => "Top Events",
            Group::Threats => "Threats",
            Group::PreventiveBarriers => "Preventive Barriers",
            Group::Consequences => "Consequences",
            Group::MitigativeBarriers => "Mitigative Barriers",
        }
    }

    /// Enclosing group, if nested.
    pub fn parent(self) -> Option<Group> {
        match self {
            Group::TopEvents => Some(Group::Hazard),
            _ => None,
        }
    }
}

impl Role {
    pub fn of(path: &FieldPath) -> Role {
        match path {
            FieldPath::Hazard => Role::Hazard,
            FieldPath::TopEvent(_) => Role::TopEvent,
            FieldPath::Threat(..) => Role::Threat,
            FieldPath::PreventiveBarrier(..) => Role::PreventiveBarrier,
            FieldPath::Consequence(..) => Role::Consequence,
            FieldPath::MitigativeBarrier(..) => Role::MitigativeBarrier,
        }
    }

    pub fn group(self) -> Group {
        match self {
            Role::Hazard => Group::Hazard,
            Role::TopEvent => Group::TopEvents,
            Role::Threat => Group::Threats,
            Role::PreventiveBarrier => Group::PreventiveBarriers,
            Role::Consequence => Group::Consequences,
            Role::MitigativeBarrier => Group::MitigativeBarriers,
        }
    }

    pub fn shape(self) -> Shape {
        match self {
            Role::TopEvent => Shape::DoubleCircle,
            _ => Shape::Rounded,
        }
    }

    pub fn style(self) -> Option<Style> {
        match self {
            Role::Hazard => Some(Style {
                fill: "#FFDE59",
                stroke: Some("#000000"),
                stroke_width: Some("8px"),
                color: None,
            }),
            Role::TopEvent => Some(Style {
                fill: "#FEB84F",
                stroke: None,
                stroke_width: None,
                color: None,
            }),
            Role::Threat => Some(Style {
                fill: "#504AFF",
                stroke: None,
                stroke_width: None,
                color: Some("#FFFFFF"),
            }),
            Role::Consequence => Some(Style {
                fill: "#D53638",
                stroke: None,
                stroke_width: None,
                color: Some("#FFFFFF"),
            }),
            Role::PreventiveBarrier | Role::MitigativeBarrier => None,
        }
    }
}

/// Diagram identifier for the node backed by `path`. Index parts are
/// 1-based and separated so that e.g. threat (1, 11) and (11, 1) differ.
pub fn node_id(path: &FieldPath) -> String {
    match *path {
        FieldPath::Hazard => "H".to_string(),
        FieldPath::TopEvent(i) => format!("TE{}", i + 1),
        FieldPath::Threat(i, j) => format!("T{}_{}", i + 1, j + 1),
        FieldPath::PreventiveBarrier(i, j, k) => format!("PB{}_{}_{}", i + 1, j + 1, k + 1),
        FieldPath::Consequence(i, j) => format!("C{}_{}", i + 1, j + 1),
        FieldPath::MitigativeBarrier(i, j, k) => format!("MB{}_{}_{}", i + 1, j + 1, k + 1),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub key: FieldPath,
    pub id: String,
    pub label: String,
}

impl Node {
    pub fn role(&self) -> Role {
        Role::of(&self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Threat side: threat → barriers → top event
    Preventive,
    /// Consequence side: top event → barriers → consequence
    Mitigative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: FieldPath,
    pub to: FieldPath,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BowtieGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl BowtieGraph {
    pub fn node(&self, key: &FieldPath) -> Option<&Node> {
        self.nodes.iter().find(|n| n.key == *key)
    }

    pub fn nodes_with_role(&self, role: Role) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.role() == role)
    }

    pub fn edges_from<'a>(&'a self, key: &'a FieldPath) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.from == *key)
    }

    fn add_node(&mut self, key: FieldPath, text: &str, words_per_line: usize) {
        self.nodes.push(Node {
            key,
            id: node_id(&key),
            label: wrap_text(text, words_per_line),
        });
    }

    fn add_edge(&mut self, from: FieldPath, to: FieldPath, kind: EdgeKind) {
        self.edges.push(Edge { from, to, kind });
    }
}

/// Build the graph for `record`.
///
/// Top events are visited in reverse index order; within each, threats run
/// forward and consequences in reverse. The order only affects placement,
/// but is fixed so output stays stable.
pub fn compile(record: &BowtieRecord, words_per_line: usize) -> BowtieResult<BowtieGraph> {
    if let Some(problem) = renderability_problem(record) {
        return Err(BowtieError::NotRenderable(problem));
    }

    let mut graph = BowtieGraph::default();
    graph.add_node(FieldPath::Hazard, &record.hazard, words_per_line);
    for (i, te) in record.top_events.iter().enumerate() {
        graph.add_node(FieldPath::TopEvent(i), &te.top_event, words_per_line);
    }

    for (i, te) in record.top_events.iter().enumerate().rev() {
        let top = FieldPath::TopEvent(i);

        for (j, threat) in te.threats.iter().enumerate() {
            let mut prev = FieldPath::Threat(i, j);
            graph.add_node(prev, &threat.threat, words_per_line);
            for (k, barrier) in threat.preventive_barriers.iter().enumerate() {
                let key = FieldPath::PreventiveBarrier(i, j, k);
                graph.add_node(key, barrier, words_per_line);
                graph.add_edge(prev, key, EdgeKind::Preventive);
                prev = key;
            }
            graph.add_edge(prev, top, EdgeKind::Preventive);
        }

        for (j, consequence) in te.consequences.iter().enumerate().rev() {
            let end = FieldPath::Consequence(i, j);
            graph.add_node(end, &consequence.consequence, words_per_line);
            let mut prev = top;
            for (k, barrier) in consequence.mitigative_barriers.iter().enumerate() {
                let key = FieldPath::MitigativeBarrier(i, j, k);
                graph.add_node(key, barrier, words_per_line);
                graph.add_edge(prev, key, EdgeKind::Mitigative);
                prev = key;
            }
            graph.add_edge(prev, end, EdgeKind::Mitigative);
        }
    }

    tracing::debug!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "compiled bowtie graph"
    );
    Ok(graph)
}
