//! Per-user session state.
//!
//! Holds the current record, the record produced by the form editor, the
//! redraw toggle and the notices waiting to be shown. Every operation
//! converts its failures into notices and leaves prior state in place.

use std::fmt;

use crate::editor::{self, FormEdit, FormShape};
use crate::export::json_download;
use crate::import::{self, Workbook};
use crate::mermaid::{record_to_mermaid, render_outline};
use crate::pdf::pdf_download;
use crate::transcript::{extract_record, Extraction};
use crate::validate::unsafe_fields;
use crate::{BowtieRecord, BowtieResult, Download};

pub const NO_RECORD_WARNING: &str =
    "The response did not contain the expected bowtie_data dictionary. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "success",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Record from the latest chat reply or import.
    pub record: Option<BowtieRecord>,
    /// Record rebuilt by the form editor; preferred when compiling.
    pub diagram: Option<BowtieRecord>,
    pub redraw: bool,
    notices: Vec<Notice>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        // shown to the user through drain_notices; the log only keeps a trace
        tracing::debug!(%level, "{message}");
        self.notices.push(Notice { level, message });
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Take every pending notice, oldest first.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn replace_record(&mut self, record: BowtieRecord) {
        self.record = Some(record);
        self.diagram = None;
    }

    /// Feed an assistant reply through the transcript parser. Returns true
    /// when the record was replaced.
    pub fn apply_transcript(&mut self, text: &str) -> bool {
        match extract_record(text) {
            Extraction::Absent => false,
            Extraction::Parsed(record) => {
                self.replace_record(record);
                true
            }
            Extraction::Invalid(e) => {
                self.notify(NoticeLevel::Warning, format!("Could not parse bowtie_data: {e}"));
                false
            }
        }
    }

    pub fn import_workbook(&mut self, book: &Workbook) -> bool {
        match import::import_workbook(book) {
            Ok(record) => {
                self.replace_record(record);
                self.notify(NoticeLevel::Success, "Bowtie data successfully imported from Excel.");
                true
            }
            Err(e) => {
                self.notify(NoticeLevel::Error, format!("Failed to process Excel file: {e}"));
                false
            }
        }
    }

    pub fn import_xlsx(&mut self, bytes: &[u8]) -> bool {
        match Workbook::from_bytes(bytes) {
            Ok(book) => self.import_workbook(&book),
            Err(e) => {
                self.notify(NoticeLevel::Error, format!("Failed to process Excel file: {e}"));
                false
            }
        }
    }

    pub fn import_json(&mut self, text: &str) -> bool {
        match import::import_json(text) {
            Ok(record) => {
                self.replace_record(record);
                self.notify(
                    NoticeLevel::Success,
                    "bowtie_data has been successfully loaded from the uploaded file.",
                );
                true
            }
            Err(e) => {
                self.notify(NoticeLevel::Error, format!("Failed to load JSON: {e}"));
                false
            }
        }
    }

    /// Rebuild the diagram record from the current record, the requested
    /// shape and the field edits.
    pub fn refresh_form(&mut self, shape: &FormShape, edits: &[FormEdit]) -> Option<&BowtieRecord> {
        let diagram = match editor::edit(self.record.as_ref(), shape, edits) {
            Ok(d) => d,
            Err(e) => {
                self.notify(NoticeLevel::Error, format!("Could not apply edit: {e}"));
                return None;
            }
        };
        for path in unsafe_fields(&diagram) {
            self.notify(
                NoticeLevel::Warning,
                format!(
                    "{} ({path}) contains special characters that may break the diagram",
                    path.label()
                ),
            );
        }
        self.diagram = Some(diagram);
        self.diagram.as_ref()
    }

    fn require_record(&mut self) -> Option<BowtieRecord> {
        if self.record.is_none() {
            self.notify(NoticeLevel::Warning, NO_RECORD_WARNING);
        }
        self.record.clone()
    }

    pub fn export_json(&mut self) -> Option<Download> {
        self.require_record().map(|r| json_download(&r))
    }

    /// The placeholder PDF carries no record data, but is only offered once
    /// there is something to export.
    pub fn export_pdf(&mut self) -> Option<Download> {
        self.require_record().map(|_| pdf_download())
    }

    /// Replace the record with the worked example.
    pub fn load_sample(&mut self) {
        self.replace_record(BowtieRecord::sample());
        self.notify(NoticeLevel::Info, "Loaded the example bowtie (Flammable gas / Gas leak).");
    }

    fn diagram_source(&mut self) -> Option<BowtieRecord> {
        match self.diagram.clone() {
            Some(d) => Some(d),
            None => self.require_record(),
        }
    }

    fn rendered(&mut self, text: BowtieResult<String>) -> Option<String> {
        match text {
            Ok(text) => Some(text),
            Err(e) => {
                self.notify(NoticeLevel::Warning, e.to_string());
                None
            }
        }
    }

    /// Mermaid text for the diagram record, falling back to the current record.
    pub fn compile_diagram(&mut self, words_per_line: usize) -> Option<String> {
        let source = self.diagram_source()?;
        let text = record_to_mermaid(&source, words_per_line);
        self.rendered(text)
    }

    /// Like [`Session::compile_diagram`], in the compact outline form.
    pub fn compile_outline(&mut self, words_per_line: usize) -> Option<String> {
        let source = self.diagram_source()?;
        let text = render_outline(&source, words_per_line);
        self.rendered(text)
    }

    pub fn toggle_redraw(&mut self) {
        self.redraw = !self.redraw;
    }

    /// Key the renderer caches output under; changes on every redraw.
    pub fn render_key(&self) -> String {
        format!("mermaid_{}", self.redraw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldPath;
    use pretty_assertions::assert_eq;

    const REPLY: &str = "Here it is:\n```\nbowtie_data = {'hazard': 'Flammable Gas', 'top_events': [{'top_event': 'Gas leak', 'threats': [{'threat': 'Corroded pipe', 'preventive_barriers': ['Regular inspection']}], 'consequences': [{'consequence': 'Fire', 'mitigative_barriers': ['Fire suppression system']}]}]}\n```";

    fn levels(session: &mut Session) -> Vec<NoticeLevel> {
        session.drain_notices().into_iter().map(|n| n.level).collect()
    }

    #[test]
    fn transcript_without_marker_changes_nothing() {
        let mut session = Session::new();
        assert!(!session.apply_transcript("Which hazard are we looking at?"));
        assert!(session.record.is_none());
        assert!(session.notices().is_empty());
    }

    #[test]
    fn transcript_replaces_record_and_clears_form() {
        let mut session = Session::new();
        session.diagram = Some(BowtieRecord::default());
        assert!(session.apply_transcript(REPLY));
        assert_eq!(session.record.as_ref().unwrap().hazard, "Flammable Gas");
        assert!(session.diagram.is_none());
    }

    #[test]
    fn bad_transcript_warns_and_keeps_record() {
        let mut session = Session::new();
        session.apply_transcript(REPLY);
        assert!(!session.apply_transcript("bowtie_data = {'hazard': "));
        assert_eq!(session.record.as_ref().unwrap().hazard, "Flammable Gas");
        let notices = session.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
        assert!(notices[0].message.starts_with("Could not parse bowtie_data"));
    }

    #[test]
    fn malformed_json_keeps_previous_record() {
        let mut session = Session::new();
        session.apply_transcript(REPLY);
        let before = session.record.clone();

        assert!(!session.import_json("{\"hazard\": [1, 2"));
        assert_eq!(session.record, before);
        let notices = session.drain_notices();
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.starts_with("Failed to load JSON: invalid bowtie JSON"));
    }

    #[test]
    fn json_import_succeeds_with_notice() {
        let mut session = Session::new();
        assert!(session.import_json(r#"{"hazard": "Stored Energy", "top_events": []}"#));
        assert_eq!(levels(&mut session), vec![NoticeLevel::Success]);
        assert_eq!(session.record.unwrap().hazard, "Stored Energy");
    }

    #[test]
    fn unreadable_workbook_is_an_error_notice() {
        let mut session = Session::new();
        assert!(!session.import_xlsx(b"not a workbook"));
        assert!(session.record.is_none());
        assert_eq!(levels(&mut session), vec![NoticeLevel::Error]);
    }

    #[test]
    fn exports_need_a_record() {
        let mut session = Session::new();
        assert!(session.export_json().is_none());
        assert!(session.export_pdf().is_none());
        assert!(session.compile_diagram(3).is_none());
        let notices = session.drain_notices();
        assert_eq!(notices.len(), 3);
        assert!(notices.iter().all(|n| n.message == NO_RECORD_WARNING));

        session.apply_transcript(REPLY);
        assert_eq!(session.export_json().unwrap().file_name, "bowtie_data.json");
        assert_eq!(session.export_pdf().unwrap().file_name, "bowtie_diagram.pdf");
    }

    #[test]
    fn form_refresh_warns_per_unsafe_field() {
        let mut session = Session::new();
        session.apply_transcript(REPLY);
        let shape = FormShape::for_editor(session.record.as_ref());
        let edits = [
            FormEdit::new(FieldPath::Threat(0, 0), "Corroded pipe (old)"),
            FormEdit::new(FieldPath::MitigativeBarrier(0, 0, 0), "Deluge - manual"),
        ];
        let diagram = session.refresh_form(&shape, &edits).cloned().unwrap();
        assert_eq!(diagram.top_events[0].threats[0].threat, "Corroded pipe (old)");

        let notices = session.drain_notices();
        assert_eq!(notices.len(), 2);
        assert!(notices[0].message.contains("te1.t1"));
        assert!(notices[1].message.contains("te1.c1.mb1"));
    }

    #[test]
    fn compile_prefers_form_output() {
        let mut session = Session::new();
        session.apply_transcript(REPLY);
        let mut shape = FormShape::for_editor(session.record.as_ref());
        shape.set_threat_count(0, 2);
        session.refresh_form(&shape, &[]);

        let text = session.compile_diagram(3).unwrap();
        assert!(text.contains("T1_2(Enter Threat 2<br>here)"), "{text}");
    }

    #[test]
    fn blank_form_on_empty_session() {
        let mut session = Session::new();
        let diagram = session.refresh_form(&FormShape::for_editor(None), &[]).cloned().unwrap();
        assert_eq!(diagram.hazard, "Enter the hazard here");
        assert!(session.compile_diagram(3).is_some());
    }

    #[test]
    fn unrenderable_record_warns() {
        let mut session = Session::new();
        session.import_json(r#"{"hazard": "  ", "top_events": []}"#);
        session.drain_notices();
        assert!(session.compile_diagram(3).is_none());
        assert_eq!(levels(&mut session), vec![NoticeLevel::Warning]);
    }

    #[test]
    fn sample_fills_an_empty_session() {
        let mut session = Session::new();
        session.diagram = Some(BowtieRecord::default());
        session.load_sample();
        assert_eq!(session.record, Some(BowtieRecord::sample()));
        assert!(session.diagram.is_none());
        assert_eq!(levels(&mut session), vec![NoticeLevel::Info]);

        let outline = session.compile_outline(3).unwrap();
        assert!(outline.contains("TE1 --> C1_2[Injury]"), "{outline}");
        assert!(session.compile_diagram(3).unwrap().contains("T1_2(Valve failure)"));
    }

    #[test]
    fn outline_needs_a_record() {
        let mut session = Session::new();
        assert!(session.compile_outline(3).is_none());
        assert_eq!(levels(&mut session), vec![NoticeLevel::Warning]);
    }

    #[test]
    fn redraw_flips_render_key() {
        let mut session = Session::new();
        assert_eq!(session.render_key(), "mermaid_false");
        session.toggle_redraw();
        assert_eq!(session.render_key(), "mermaid_true");
        session.toggle_redraw();
        assert_eq!(session.render_key(), "mermaid_false");
    }
}
