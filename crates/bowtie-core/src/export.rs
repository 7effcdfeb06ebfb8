use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::{BowtieRecord, Download};

pub const JSON_FILE_NAME: &str = "bowtie_data.json";
pub const JSON_MIME_TYPE: &str = "application/json";

/// Pretty JSON with four-space indentation.
pub fn export_json(record: &BowtieRecord) -> String {
    let mut buf = Vec::with_capacity(512);
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    // Plain strings and vectors cannot fail to serialize, and the output is UTF-8.
    if record.serialize(&mut ser).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}

pub fn json_download(record: &BowtieRecord) -> Download {
    Download {
        file_name: JSON_FILE_NAME,
        mime_type: JSON_MIME_TYPE,
        bytes: export_json(record).into_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::import_json;
    use crate::{Consequence, Threat, TopEvent};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn uses_four_space_indent() {
        let record = BowtieRecord {
            hazard: "Flammable Gas".into(),
            top_events: vec![],
        };
        assert_eq!(
            export_json(&record),
            "{\n    \"hazard\": \"Flammable Gas\",\n    \"top_events\": []\n}"
        );
    }

    #[test]
    fn download_carries_file_name_and_mime() {
        let download = json_download(&BowtieRecord::default());
        assert_eq!(download.file_name, "bowtie_data.json");
        assert_eq!(download.mime_type, "application/json");
        assert!(!download.bytes.is_empty());
    }

    fn text() -> impl Strategy<Value = String> {
        ".{0,24}"
    }

    fn record() -> impl Strategy<Value = BowtieRecord> {
        let threat = (text(), prop::collection::vec(text(), 0..4))
            .prop_map(|(threat, preventive_barriers)| Threat { threat, preventive_barriers });
        let consequence = (text(), prop::collection::vec(text(), 0..4))
            .prop_map(|(consequence, mitigative_barriers)| Consequence { consequence, mitigative_barriers });
        let top_event = (
            text(),
            prop::collection::vec(threat, 0..4),
            prop::collection::vec(consequence, 0..4),
        )
            .prop_map(|(top_event, threats, consequences)| TopEvent { top_event, threats, consequences });
        (text(), prop::collection::vec(top_event, 0..3))
            .prop_map(|(hazard, top_events)| BowtieRecord { hazard, top_events })
    }

    proptest! {
        #[test]
        fn json_round_trip_is_identity(r in record()) {
            prop_assert_eq!(import_json(&export_json(&r)).unwrap(), r);
        }
    }
}
