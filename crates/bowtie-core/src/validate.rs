use std::fmt;
use std::str::FromStr;

use crate::{BowtieError, BowtieRecord};

/// Characters that carry meaning in the diagram markup.
pub const MARKUP_CHARS: &[char] = &['(', ')', '[', ']', '"', '\'', '-'];

/// Address of one text field inside a record. Indices are 0-based; the
/// display form (`te1.t2.pb3`) is 1-based to match the form labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldPath {
    Hazard,
    TopEvent(usize),
    Threat(usize, usize),
    PreventiveBarrier(usize, usize, usize),
    Consequence(usize, usize),
    MitigativeBarrier(usize, usize, usize),
}

impl FieldPath {
    /// Human label, e.g. "Preventive Barrier 1 | Threat 2 | Top Event 1".
    pub fn label(&self) -> String {
        match *self {
            FieldPath::Hazard => "Hazard".to_string(),
            FieldPath::TopEvent(i) => format!("Top Event {}", i + 1),
            FieldPath::Threat(i, j) => format!("Threat {} | Top Event {}", j + 1, i + 1),
            FieldPath::PreventiveBarrier(i, j, k) => format!(
                "Preventive Barrier {} | Threat {} | Top Event {}",
                k + 1,
                j + 1,
                i + 1
            ),
            FieldPath::Consequence(i, j) => format!("Consequence {} | Top Event {}", j + 1, i + 1),
            FieldPath::MitigativeBarrier(i, j, k) => format!(
                "Mitigative Barrier {} | Consequence {} | Top Event {}",
                k + 1,
                j + 1,
                i + 1
            ),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            FieldPath::Hazard => write!(f, "hazard"),
            FieldPath::TopEvent(i) => write!(f, "te{}", i + 1),
            FieldPath::Threat(i, j) => write!(f, "te{}.t{}", i + 1, j + 1),
            FieldPath::PreventiveBarrier(i, j, k) => write!(f, "te{}.t{}.pb{}", i + 1, j + 1, k + 1),
            FieldPath::Consequence(i, j) => write!(f, "te{}.c{}", i + 1, j + 1),
            FieldPath::MitigativeBarrier(i, j, k) => write!(f, "te{}.c{}.mb{}", i + 1, j + 1, k + 1),
        }
    }
}

impl FromStr for FieldPath {
    type Err = BowtieError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BowtieError::InvalidFieldPath(s.to_string());
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("hazard") {
            return Ok(FieldPath::Hazard);
        }

        let segments: Vec<&str> = trimmed.split('.').collect();
        let index = |segment: &str, prefix: &str| -> Option<usize> {
            let n: usize = segment.strip_prefix(prefix)?.parse().ok()?;
            n.checked_sub(1)
        };

        let i = index(segments[0], "te").ok_or_else(invalid)?;
        match segments[..] {
            [_] => Ok(FieldPath::TopEvent(i)),
            [_, side] => {
                if let Some(j) = index(side, "t") {
                    Ok(FieldPath::Threat(i, j))
                } else if let Some(j) = index(side, "c") {
                    Ok(FieldPath::Consequence(i, j))
                } else {
                    Err(invalid())
                }
            }
            [_, side, barrier] => {
                if let (Some(j), Some(k)) = (index(side, "t"), index(barrier, "pb")) {
                    Ok(FieldPath::PreventiveBarrier(i, j, k))
                } else if let (Some(j), Some(k)) = (index(side, "c"), index(barrier, "mb")) {
                    Ok(FieldPath::MitigativeBarrier(i, j, k))
                } else {
                    Err(invalid())
                }
            }
            _ => Err(invalid()),
        }
    }
}

/// A record can be drawn once it names a hazard and every top event has text.
pub fn is_renderable(record: &BowtieRecord) -> bool {
    !record.hazard.trim().is_empty()
        && record
            .top_events
            .iter()
            .all(|te| !te.top_event.trim().is_empty())
}

/// Reason a record is not renderable, or `None` when it is.
pub fn renderability_problem(record: &BowtieRecord) -> Option<String> {
    if record.hazard.trim().is_empty() {
        return Some("hazard is empty".to_string());
    }
    record
        .top_events
        .iter()
        .position(|te| te.top_event.trim().is_empty())
        .map(|i| format!("top event {} is empty", i + 1))
}

/// False when `text` contains characters that may break the diagram markup.
pub fn is_display_safe(text: &str) -> bool {
    !text.contains(MARKUP_CHARS)
}

/// Paths of all fields whose text is not display safe, in document order.
pub fn unsafe_fields(record: &BowtieRecord) -> Vec<FieldPath> {
    record
        .fields()
        .into_iter()
        .filter(|(_, text)| !is_display_safe(text))
        .map(|(path, _)| path)
        .collect()
}
