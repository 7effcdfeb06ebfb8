pub mod editor;
pub mod error;
pub mod export;
pub mod graph;
pub mod import;
pub mod literal;
pub mod mermaid;
pub mod pdf;
pub mod rules;
pub mod session;
pub mod transcript;
pub mod validate;
pub mod wrap;

pub use error::{BowtieError, BowtieResult};
pub use validate::{is_display_safe, is_renderable, FieldPath};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// --- Types ---

/// One hazard and everything hanging off it.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, schemars::JsonSchema)]
pub struct BowtieRecord {
    /// The hazard under analysis, title case by convention
    #[serde(default)]
    pub hazard: String,
    #[serde(default)]
    pub top_events: Vec<TopEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, schemars::JsonSchema)]
pub struct TopEvent {
    /// The moment control over the hazard is lost
    #[serde(default)]
    pub top_event: String,
    #[serde(default)]
    pub threats: Vec<Threat>,
    #[serde(default)]
    pub consequences: Vec<Consequence>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, schemars::JsonSchema)]
pub struct Threat {
    /// A direct, independent cause of the top event
    #[serde(default)]
    pub threat: String,
    /// Barriers between this threat and the top event, in chain order
    #[serde(default)]
    pub preventive_barriers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, schemars::JsonSchema)]
pub struct Consequence {
    /// Harmful outcome that can follow the top event
    #[serde(default)]
    pub consequence: String,
    /// Barriers between the top event and this consequence, in chain order
    #[serde(default)]
    pub mitigative_barriers: Vec<String>,
}

impl BowtieRecord {
    /// Text of the field at `path`, if the record has it.
    pub fn field(&self, path: &FieldPath) -> Option<&str> {
        let s = match *path {
            FieldPath::Hazard => &self.hazard,
            FieldPath::TopEvent(i) => &self.top_events.get(i)?.top_event,
            FieldPath::Threat(i, j) => &self.top_events.get(i)?.threats.get(j)?.threat,
            FieldPath::PreventiveBarrier(i, j, k) => self
                .top_events
                .get(i)?
                .threats
                .get(j)?
                .preventive_barriers
                .get(k)?,
            FieldPath::Consequence(i, j) => {
                &self.top_events.get(i)?.consequences.get(j)?.consequence
            }
            FieldPath::MitigativeBarrier(i, j, k) => self
                .top_events
                .get(i)?
                .consequences
                .get(j)?
                .mitigative_barriers
                .get(k)?,
        };
        Some(s.as_str())
    }

    /// Replace the text at `path`. Siblings are left alone.
    pub fn set_field(&mut self, path: &FieldPath, value: impl Into<String>) -> BowtieResult<()> {
        let slot = self
            .field_mut(path)
            .ok_or_else(|| BowtieError::NoSuchField(path.to_string()))?;
        *slot = value.into();
        Ok(())
    }

    fn field_mut(&mut self, path: &FieldPath) -> Option<&mut String> {
        match *path {
            FieldPath::Hazard => Some(&mut self.hazard),
            FieldPath::TopEvent(i) => Some(&mut self.top_events.get_mut(i)?.top_event),
            FieldPath::Threat(i, j) => Some(&mut self.top_events.get_mut(i)?.threats.get_mut(j)?.threat),
            FieldPath::PreventiveBarrier(i, j, k) => self
                .top_events
                .get_mut(i)?
                .threats
                .get_mut(j)?
                .preventive_barriers
                .get_mut(k),
            FieldPath::Consequence(i, j) => Some(
                &mut self
                    .top_events
                    .get_mut(i)?
                    .consequences
                    .get_mut(j)?
                    .consequence,
            ),
            FieldPath::MitigativeBarrier(i, j, k) => self
                .top_events
                .get_mut(i)?
                .consequences
                .get_mut(j)?
                .mitigative_barriers
                .get_mut(k),
        }
    }

    /// Worked example shown when there is nothing else to draw.
    pub fn sample() -> Self {
        let threat = |name: &str, barriers: &[&str]| Threat {
            threat: name.to_string(),
            preventive_barriers: barriers.iter().map(|b| b.to_string()).collect(),
        };
        let consequence = |name: &str, barriers: &[&str]| Consequence {
            consequence: name.to_string(),
            mitigative_barriers: barriers.iter().map(|b| b.to_string()).collect(),
        };
        Self {
            hazard: "Flammable gas".to_string(),
            top_events: vec![TopEvent {
                top_event: "Gas leak".to_string(),
                threats: vec![
                    threat("Corroded pipe", &["Regular inspection", "Pipe coating"]),
                    threat("Valve failure", &["Maintenance schedule"]),
                ],
                consequences: vec![
                    consequence("Fire", &["Fire suppression system", "Emergency shutdown"]),
                    consequence("Injury", &["Evacuation plan"]),
                ],
            }],
        }
    }

    /// All text fields in document order, paired with their paths.
    pub fn fields(&self) -> Vec<(FieldPath, &str)> {
        let mut out = vec![(FieldPath::Hazard, self.hazard.as_str())];
        for (i, te) in self.top_events.iter().enumerate() {
            out.push((FieldPath::TopEvent(i), te.top_event.as_str()));
            for (j, t) in te.threats.iter().enumerate() {
                out.push((FieldPath::Threat(i, j), t.threat.as_str()));
                for (k, b) in t.preventive_barriers.iter().enumerate() {
                    out.push((FieldPath::PreventiveBarrier(i, j, k), b.as_str()));
                }
            }
            for (j, c) in te.consequences.iter().enumerate() {
                out.push((FieldPath::Consequence(i, j), c.consequence.as_str()));
                for (k, b) in c.mitigative_barriers.iter().enumerate() {
                    out.push((FieldPath::MitigativeBarrier(i, j, k), b.as_str()));
                }
            }
        }
        out
    }
}

/// JSON Schema of the record file format.
pub fn record_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(BowtieRecord)).unwrap_or_default()
}

/// A file handed to the user for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: &'static str,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Download {
    /// Write the artifact into `dir` under its own file name.
    pub fn save_in(&self, dir: &Path) -> BowtieResult<PathBuf> {
        let path = dir.join(self.file_name);
        fs::write(&path, &self.bytes).map_err(BowtieError::Io)?;
        Ok(path)
    }
}

// --- AI Settings ---

pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Resolve the settings directory (~/.bowtie/).
pub fn settings_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bowtie")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: String::new(),
            model: default_model(),
        }
    }
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn settings_path() -> PathBuf {
    settings_dir().join("settings.json")
}

pub fn read_settings() -> AiSettings {
    read_settings_from(&settings_path())
}

/// Read settings from `path`. Missing or unreadable files fall back to defaults.
pub fn read_settings_from(path: &Path) -> AiSettings {
    if !path.exists() {
        return AiSettings::default();
    }
    fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn write_settings(settings: &AiSettings) -> BowtieResult<()> {
    write_settings_to(&settings_path(), settings)
}

pub fn write_settings_to(path: &Path, settings: &AiSettings) -> BowtieResult<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(BowtieError::Io)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(BowtieError::Json)?;
    fs::write(path, json).map_err(BowtieError::Io)
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}
