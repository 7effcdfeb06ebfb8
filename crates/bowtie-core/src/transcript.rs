use crate::literal::parse_literal;
use crate::{BowtieError, BowtieRecord, BowtieResult};

/// Name the model assigns the record to in its reply.
pub const MARKER: &str = "bowtie_data";

const FENCE: &str = "```";

/// Result of looking for a record in an assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The reply carries no `bowtie_data =` assignment.
    Absent,
    Parsed(BowtieRecord),
    /// An assignment was found but could not be read.
    Invalid(String),
}

/// Pull the `bowtie_data = {...}` literal out of free-form text.
///
/// The literal runs from the marker to the next code fence, or to the end
/// of the text. Never panics, whatever the input.
pub fn extract_record(text: &str) -> Extraction {
    let Some(body_start) = find_assignment(text) else {
        return Extraction::Absent;
    };
    let rest = &text[body_start..];
    let body = rest.split(FENCE).next().unwrap_or(rest).trim();

    match read_record(body) {
        Ok(record) => {
            tracing::debug!(top_events = record.top_events.len(), "extracted bowtie_data");
            Extraction::Parsed(record)
        }
        Err(e) => {
            tracing::warn!(error = %e, "bowtie_data could not be read");
            Extraction::Invalid(e.to_string())
        }
    }
}

fn read_record(body: &str) -> BowtieResult<BowtieRecord> {
    let value = parse_literal(body)?;
    serde_json::from_value(value).map_err(|e| BowtieError::Literal(e.to_string()))
}

/// Byte offset just past the first `bowtie_data =` (any spacing around `=`).
fn find_assignment(text: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(found) = text[from..].find(MARKER) {
        let after = from + found + MARKER.len();
        let tail = &text[after..];
        let trimmed = tail.trim_start();
        if let Some(body) = trimmed.strip_prefix('=') {
            // `==` is a comparison, not an assignment
            if !body.starts_with('=') {
                return Some(text.len() - body.len());
            }
        }
        from = after;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_marker_means_no_update() {
        assert_eq!(extract_record("What is the hazard you want to analyse?"), Extraction::Absent);
        assert_eq!(extract_record(""), Extraction::Absent);
        assert_eq!(extract_record("I will fill bowtie_data once we are done."), Extraction::Absent);
    }

    #[test]
    fn extracts_record_from_fenced_reply() {
        let reply = "The diagram is ready.\n```python\nbowtie_data = {\n  'hazard': 'Flammable Gas',\n  'top_events': [{\n    'top_event': 'Gas leak',\n    'threats': [{'threat': 'Corroded pipe', 'preventive_barriers': ['Regular inspection', 'Pipe coating']}],\n    'consequences': [{'consequence': 'Fire', 'mitigative_barriers': ['Fire suppression system']}],\n  }],\n}\n```\nLet me know if anything should change.";
        let Extraction::Parsed(record) = extract_record(reply) else {
            panic!("expected a record");
        };
        assert_eq!(record.hazard, "Flammable Gas");
        let te = &record.top_events[0];
        assert_eq!(te.threats[0].preventive_barriers, vec!["Regular inspection", "Pipe coating"]);
        assert_eq!(te.consequences[0].consequence, "Fire");
    }

    #[test]
    fn unfenced_assignment_runs_to_end_of_text() {
        let reply = "bowtie_data={\"hazard\": \"Stored Energy\", \"top_events\": []}";
        let Extraction::Parsed(record) = extract_record(reply) else {
            panic!("expected a record");
        };
        assert_eq!(record.hazard, "Stored Energy");
        assert!(record.top_events.is_empty());
    }

    #[test]
    fn malformed_literal_is_reported_not_raised() {
        let reply = "```\nbowtie_data = {'hazard': 'Gas', 'top_events': [\n```";
        match extract_record(reply) {
            Extraction::Invalid(msg) => assert!(msg.contains("end of text"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wrong_shape_is_reported() {
        let reply = "bowtie_data = {'hazard': 'Gas', 'top_events': 'none yet'}";
        assert!(matches!(extract_record(reply), Extraction::Invalid(_)));
        let reply = "bowtie_data = 'Gas'";
        assert!(matches!(extract_record(reply), Extraction::Invalid(_)));
    }

    #[test]
    fn comparison_is_not_an_assignment() {
        assert_eq!(extract_record("if bowtie_data == None: pass"), Extraction::Absent);
    }

    #[test]
    fn arbitrary_text_never_panics() {
        for text in ["bowtie_data =", "bowtie_data = ```", "bowtie_data =\u{1F600}", "xbowtie_data = é{"] {
            let _ = extract_record(text);
        }
    }
}
