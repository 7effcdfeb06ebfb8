//! Form editor: reshape a record to requested counts and apply field edits.
//!
//! The editor always rebuilds the whole tree. Each field keeps the existing
//! value at the same position, or gets a numbered placeholder when there is
//! none.

use crate::{BowtieRecord, BowtieResult, Consequence, FieldPath, Threat, TopEvent};

pub const MIN_BRANCHES: usize = 1;
pub const MIN_BARRIERS: usize = 1;
pub const MAX_BARRIERS: usize = 5;

/// The interactive editor shows exactly one top event. The data model,
/// importers and compiler all accept more.
pub const EDITOR_TOP_EVENT_LIMIT: usize = 1;

pub const HAZARD_PLACEHOLDER: &str = "Enter the hazard here";

pub fn top_event_placeholder(i: usize) -> String {
    format!("Enter Top Event {} here", i + 1)
}

pub fn threat_placeholder(j: usize) -> String {
    format!("Enter Threat {} here", j + 1)
}

pub fn preventive_barrier_placeholder(k: usize) -> String {
    format!("Enter Preventive Barrier {} here", k + 1)
}

pub fn consequence_placeholder(j: usize) -> String {
    format!("Enter Consequence {} here", j + 1)
}

pub fn mitigative_barrier_placeholder(k: usize) -> String {
    format!("Enter Mitigative Barrier {} here", k + 1)
}

fn clamp_branches(n: usize) -> usize {
    n.max(MIN_BRANCHES)
}

fn clamp_barriers(n: usize) -> usize {
    n.clamp(MIN_BARRIERS, MAX_BARRIERS)
}

/// Counts for one top event: barrier count per threat and per consequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopEventShape {
    pub threats: Vec<usize>,
    pub consequences: Vec<usize>,
}

impl Default for TopEventShape {
    fn default() -> Self {
        Self {
            threats: vec![MIN_BARRIERS],
            consequences: vec![MIN_BARRIERS],
        }
    }
}

impl TopEventShape {
    fn of(te: &TopEvent) -> Self {
        let mut threats: Vec<usize> = te
            .threats
            .iter()
            .map(|t| clamp_barriers(t.preventive_barriers.len()))
            .collect();
        let mut consequences: Vec<usize> = te
            .consequences
            .iter()
            .map(|c| clamp_barriers(c.mitigative_barriers.len()))
            .collect();
        if threats.is_empty() {
            threats.push(MIN_BARRIERS);
        }
        if consequences.is_empty() {
            consequences.push(MIN_BARRIERS);
        }
        Self {
            threats,
            consequences,
        }
    }
}

/// Requested shape of the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormShape {
    pub top_events: Vec<TopEventShape>,
}

impl Default for FormShape {
    fn default() -> Self {
        Self {
            top_events: vec![TopEventShape::default()],
        }
    }
}

impl FormShape {
    /// Shape matching `record`, with every count clamped to the form bounds.
    pub fn of(record: Option<&BowtieRecord>) -> Self {
        let Some(record) = record else {
            return Self::default();
        };
        let mut top_events: Vec<TopEventShape> =
            record.top_events.iter().map(TopEventShape::of).collect();
        if top_events.is_empty() {
            top_events.push(TopEventShape::default());
        }
        Self { top_events }
    }

    /// Like [`FormShape::of`], limited to what the editor displays.
    pub fn for_editor(record: Option<&BowtieRecord>) -> Self {
        let mut shape = Self::of(record);
        shape.top_events.truncate(EDITOR_TOP_EVENT_LIMIT);
        shape
    }

    pub fn set_top_event_count(&mut self, n: usize) {
        self.top_events
            .resize_with(clamp_branches(n), TopEventShape::default);
    }

    pub fn set_threat_count(&mut self, te: usize, n: usize) {
        if let Some(shape) = self.top_events.get_mut(te) {
            shape.threats.resize(clamp_branches(n), MIN_BARRIERS);
        }
    }

    pub fn set_consequence_count(&mut self, te: usize, n: usize) {
        if let Some(shape) = self.top_events.get_mut(te) {
            shape.consequences.resize(clamp_branches(n), MIN_BARRIERS);
        }
    }

    pub fn set_preventive_barrier_count(&mut self, te: usize, threat: usize, n: usize) {
        if let Some(count) = self
            .top_events
            .get_mut(te)
            .and_then(|s| s.threats.get_mut(threat))
        {
            *count = clamp_barriers(n);
        }
    }

    pub fn set_mitigative_barrier_count(&mut self, te: usize, consequence: usize, n: usize) {
        if let Some(count) = self
            .top_events
            .get_mut(te)
            .and_then(|s| s.consequences.get_mut(consequence))
        {
            *count = clamp_barriers(n);
        }
    }
}

/// New text for one field of the reshaped record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormEdit {
    pub path: FieldPath,
    pub value: String,
}

impl FormEdit {
    pub fn new(path: FieldPath, value: impl Into<String>) -> Self {
        Self {
            path,
            value: value.into(),
        }
    }
}

/// Rebuild a record with the given shape from `record` and placeholders.
pub fn reshape(record: Option<&BowtieRecord>, shape: &FormShape) -> BowtieRecord {
    let existing = |path: FieldPath| record.and_then(|r| r.field(&path)).map(str::to_string);

    let top_events = shape
        .top_events
        .iter()
        .enumerate()
        .map(|(i, te_shape)| TopEvent {
            top_event: existing(FieldPath::TopEvent(i)).unwrap_or_else(|| top_event_placeholder(i)),
            threats: te_shape
                .threats
                .iter()
                .enumerate()
                .map(|(j, &barriers)| Threat {
                    threat: existing(FieldPath::Threat(i, j)).unwrap_or_else(|| threat_placeholder(j)),
                    preventive_barriers: (0..barriers)
                        .map(|k| {
                            existing(FieldPath::PreventiveBarrier(i, j, k))
                                .unwrap_or_else(|| preventive_barrier_placeholder(k))
                        })
                        .collect(),
                })
                .collect(),
            consequences: te_shape
                .consequences
                .iter()
                .enumerate()
                .map(|(j, &barriers)| Consequence {
                    consequence: existing(FieldPath::Consequence(i, j))
                        .unwrap_or_else(|| consequence_placeholder(j)),
                    mitigative_barriers: (0..barriers)
                        .map(|k| {
                            existing(FieldPath::MitigativeBarrier(i, j, k))
                                .unwrap_or_else(|| mitigative_barrier_placeholder(k))
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    BowtieRecord {
        hazard: existing(FieldPath::Hazard).unwrap_or_else(|| HAZARD_PLACEHOLDER.to_string()),
        top_events,
    }
}

/// Reshape, then apply `edits` in order.
pub fn edit(
    record: Option<&BowtieRecord>,
    shape: &FormShape,
    edits: &[FormEdit],
) -> BowtieResult<BowtieRecord> {
    let mut out = reshape(record, shape);
    for e in edits {
        out.set_field(&e.path, e.value.clone())?;
    }
    Ok(out)
}
