mod chat;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bowtie_core::editor::{FormEdit, FormShape};
use bowtie_core::session::{NoticeLevel, Session};
use bowtie_core::wrap::DEFAULT_WORDS_PER_LINE;
use bowtie_core::{AiSettings, FieldPath};

#[derive(Parser)]
#[command(name = "bowtie")]
#[command(about = "Build bowtie risk diagrams from a facilitated chat, spreadsheets or forms")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Talk the diagram through with the facilitation agent
    Chat {
        #[command(flatten)]
        ai: AiArgs,
        /// Directory the final bowtie_data.json is written to
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Also save the conversation as JSON
        #[arg(long)]
        transcript: Option<PathBuf>,
    },
    /// Import a workbook with Threats, Consequences and Info sheets
    ImportExcel {
        path: PathBuf,
        /// Directory the bowtie_data.json is written to
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Check a bowtie JSON file and print it normalised
    ImportJson { path: PathBuf },
    /// Extract bowtie_data from a saved assistant reply (`-` reads stdin)
    ImportTranscript { path: PathBuf },
    /// Reshape a record and edit its fields
    Edit {
        /// Record to start from; omitted means a blank form
        path: Option<PathBuf>,
        #[arg(long)]
        threats: Option<usize>,
        #[arg(long)]
        consequences: Option<usize>,
        /// Preventive barrier count for one threat, as THREAT:COUNT (1-based)
        #[arg(long = "preventive-barriers", value_parser = parse_count)]
        preventive_barriers: Vec<(usize, usize)>,
        /// Mitigative barrier count for one consequence, as CONSEQUENCE:COUNT (1-based)
        #[arg(long = "mitigative-barriers", value_parser = parse_count)]
        mitigative_barriers: Vec<(usize, usize)>,
        /// Field edit, e.g. te1.t2.pb1="Pipe coating"
        #[arg(long = "set", value_parser = parse_edit)]
        edits: Vec<FormEdit>,
        /// Write the result here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the Mermaid flowchart for a record
    Render {
        #[arg(required_unless_present = "sample")]
        path: Option<PathBuf>,
        /// Draw the worked example instead of a file
        #[arg(long, conflicts_with = "path")]
        sample: bool,
        /// Plain left-to-right outline without subgraphs or styling
        #[arg(long)]
        outline: bool,
        #[arg(long, default_value_t = DEFAULT_WORDS_PER_LINE)]
        words: usize,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write the placeholder PDF for a record
    ExportPdf {
        path: PathBuf,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Print the JSON Schema of the record format
    Schema,
    /// Show or update the stored AI settings
    Settings {
        #[command(flatten)]
        ai: AiArgs,
    },
}

#[derive(Args, Debug, Default, Clone)]
struct AiArgs {
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long = "api-key")]
    api_key: Option<String>,
}

impl AiArgs {
    fn is_empty(&self) -> bool {
        self.provider.is_none() && self.model.is_none() && self.api_key.is_none()
    }

    /// Stored settings with this run's overrides applied.
    fn resolve(&self, mut settings: AiSettings) -> AiSettings {
        if settings.api_key.is_empty() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                settings.api_key = key;
            }
        }
        self.apply(&mut settings);
        settings
    }

    fn apply(&self, settings: &mut AiSettings) {
        if let Some(p) = &self.provider {
            settings.provider = p.clone();
        }
        if let Some(m) = &self.model {
            settings.model = m.clone();
        }
        // Empty key means "keep existing"
        if let Some(k) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            settings.api_key = k.clone();
        }
    }
}

fn parse_count(s: &str) -> Result<(usize, usize), String> {
    let (index, count) = s
        .split_once(':')
        .ok_or_else(|| format!("expected INDEX:COUNT, got '{s}'"))?;
    let index: usize = index.trim().parse().map_err(|e| format!("bad index '{index}': {e}"))?;
    let count: usize = count.trim().parse().map_err(|e| format!("bad count '{count}': {e}"))?;
    if index == 0 {
        return Err("indices start at 1".to_string());
    }
    Ok((index - 1, count))
}

fn parse_edit(s: &str) -> Result<FormEdit, String> {
    let (path, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected PATH=VALUE, got '{s}'"))?;
    let path: FieldPath = path.trim().parse().map_err(|e: bowtie_core::BowtieError| e.to_string())?;
    Ok(FormEdit::new(path, value))
}

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("bowtie=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

/// Print pending notices to stderr. Returns false if any was an error.
fn report(session: &mut Session) -> bool {
    let mut ok = true;
    for notice in session.drain_notices() {
        ok &= notice.level != NoticeLevel::Error;
        eprintln!("{}: {}", notice.level, notice.message);
    }
    ok
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).context("reading stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load_session(path: &Path) -> anyhow::Result<Session> {
    let mut session = Session::new();
    let loaded = session.import_json(&read_input(path)?);
    // the success notice is noise for commands that only consume the record
    let errors: Vec<String> = session
        .drain_notices()
        .into_iter()
        .filter(|n| n.level == NoticeLevel::Error)
        .map(|n| n.message)
        .collect();
    if !loaded {
        bail!("{}", errors.join("; "));
    }
    Ok(session)
}

fn write_output(out: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn edit_shape(
    session: &Session,
    threats: Option<usize>,
    consequences: Option<usize>,
    preventive: &[(usize, usize)],
    mitigative: &[(usize, usize)],
) -> FormShape {
    let mut shape = FormShape::for_editor(session.record.as_ref());
    if let Some(n) = threats {
        shape.set_threat_count(0, n);
    }
    if let Some(n) = consequences {
        shape.set_consequence_count(0, n);
    }
    for &(j, n) in preventive {
        shape.set_preventive_barrier_count(0, j, n);
    }
    for &(j, n) in mitigative {
        shape.set_mitigative_barrier_count(0, j, n);
    }
    shape
}

pub fn run() -> anyhow::Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Chat { ai, out, transcript } => {
            let settings = ai.resolve(bowtie_core::read_settings());
            if !bowtie_core::ai_configured(&settings) {
                bail!("no API key for {}; pass --api-key, set OPENAI_API_KEY or run `bowtie settings`", settings.provider);
            }
            let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
            runtime.block_on(chat::run(settings, &out, transcript.as_deref()))?;
        }
        Commands::ImportExcel { path, out } => {
            let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            let mut session = Session::new();
            session.import_xlsx(&bytes);
            if !report(&mut session) {
                bail!("import failed");
            }
            if let Some(download) = session.export_json() {
                let saved = download.save_in(&out)?;
                println!("{}", saved.display());
            }
        }
        Commands::ImportJson { path } => {
            let mut session = load_session(&path)?;
            if let Some(download) = session.export_json() {
                println!("{}", String::from_utf8_lossy(&download.bytes));
            }
        }
        Commands::ImportTranscript { path } => {
            let text = read_input(&path)?;
            let mut session = Session::new();
            let updated = session.apply_transcript(&text);
            let clean = report(&mut session);
            if !updated {
                if clean {
                    bail!("{}", bowtie_core::session::NO_RECORD_WARNING);
                }
                bail!("bowtie_data could not be read");
            }
            if let Some(download) = session.export_json() {
                println!("{}", String::from_utf8_lossy(&download.bytes));
            }
        }
        Commands::Edit {
            path,
            threats,
            consequences,
            preventive_barriers,
            mitigative_barriers,
            edits,
            out,
        } => {
            let mut session = match &path {
                Some(p) => load_session(p)?,
                None => Session::new(),
            };
            let shape = edit_shape(
                &session,
                threats,
                consequences,
                &preventive_barriers,
                &mitigative_barriers,
            );
            let edited = session.refresh_form(&shape, &edits).cloned();
            let clean = report(&mut session);
            match edited {
                Some(record) => write_output(out.as_deref(), &bowtie_core::export::export_json(&record))?,
                None if !clean => bail!("edit failed"),
                None => {}
            }
        }
        Commands::Render {
            path, outline, words, out, ..
        } => {
            let mut session = match path {
                Some(path) => load_session(&path)?,
                None => {
                    let mut session = Session::new();
                    session.load_sample();
                    session
                }
            };
            let text = if outline {
                session.compile_outline(words)
            } else {
                session.compile_diagram(words)
            };
            report(&mut session);
            match text {
                Some(text) => write_output(out.as_deref(), &text)?,
                None => bail!("nothing to render"),
            }
        }
        Commands::ExportPdf { path, out } => {
            let mut session = load_session(&path)?;
            if let Some(download) = session.export_pdf() {
                let saved = download.save_in(&out)?;
                println!("{}", saved.display());
            }
            report(&mut session);
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&bowtie_core::record_schema())?);
        }
        Commands::Settings { ai } => {
            let mut settings = bowtie_core::read_settings();
            if !ai.is_empty() {
                ai.apply(&mut settings);
                bowtie_core::write_settings(&settings)?;
                tracing::info!(provider = %settings.provider, model = %settings.model, "saved AI settings");
            }
            // Mask API key, only show whether it is set
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "provider": settings.provider,
                    "model": settings.model,
                    "hasKey": !settings.api_key.is_empty(),
                    "configured": bowtie_core::ai_configured(&settings),
                }))?
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn count_pairs_are_one_based() {
        assert_eq!(parse_count("2:3"), Ok((1, 3)));
        assert!(parse_count("0:3").is_err());
        assert!(parse_count("2").is_err());
        assert!(parse_count("x:1").is_err());
    }

    #[test]
    fn edits_parse_path_and_keep_value_verbatim() {
        let edit = parse_edit("te1.t2.pb1=Pipe coating = good").unwrap();
        assert_eq!(edit.path, FieldPath::PreventiveBarrier(0, 1, 0));
        assert_eq!(edit.value, "Pipe coating = good");
        assert!(parse_edit("te1.x1=foo").is_err());
        assert!(parse_edit("hazard").is_err());
    }

    #[test]
    fn edit_command_parses() {
        let cli = Cli::try_parse_from([
            "bowtie",
            "edit",
            "gas.json",
            "--threats",
            "2",
            "--preventive-barriers",
            "2:3",
            "--set",
            "hazard=Flammable gas",
        ])
        .unwrap();
        let Commands::Edit {
            path,
            threats,
            preventive_barriers,
            edits,
            ..
        } = cli.command
        else {
            panic!("expected edit");
        };
        assert_eq!(path, Some(PathBuf::from("gas.json")));
        assert_eq!(threats, Some(2));
        assert_eq!(preventive_barriers, vec![(1, 3)]);
        assert_eq!(edits, vec![FormEdit::new(FieldPath::Hazard, "Flammable gas")]);
    }

    #[test]
    fn render_takes_a_path_or_the_sample() {
        let cli = Cli::try_parse_from(["bowtie", "render", "--sample", "--outline"]).unwrap();
        let Commands::Render {
            path, sample, outline, ..
        } = cli.command
        else {
            panic!("expected render");
        };
        assert_eq!(path, None);
        assert!(sample);
        assert!(outline);

        assert!(Cli::try_parse_from(["bowtie", "render"]).is_err());
        assert!(Cli::try_parse_from(["bowtie", "render", "gas.json", "--sample"]).is_err());
    }

    #[test]
    fn flags_override_stored_settings() {
        let args = AiArgs {
            provider: Some("ollama".into()),
            model: Some("llama3".into()),
            api_key: Some(String::new()),
        };
        let stored = AiSettings {
            api_key: "sk-stored".into(),
            ..AiSettings::default()
        };
        let resolved = args.resolve(stored);
        assert_eq!(resolved.provider, "ollama");
        assert_eq!(resolved.model, "llama3");
        assert_eq!(resolved.api_key, "sk-stored");
    }

    #[test]
    fn edit_shape_targets_first_top_event() {
        let session = Session::new();
        let shape = edit_shape(&session, Some(3), Some(0), &[(2, 9)], &[]);
        assert_eq!(shape.top_events.len(), 1);
        assert_eq!(shape.top_events[0].threats, vec![1, 1, 5]);
        assert_eq!(shape.top_events[0].consequences, vec![1]);
    }

    #[test]
    fn load_session_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"hazard\": ").unwrap();
        let err = load_session(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to load JSON"), "{err}");

        std::fs::write(&path, "{\"hazard\": \"Flammable gas\"}").unwrap();
        let session = load_session(&path).unwrap();
        assert_eq!(session.record.unwrap().hazard, "Flammable gas");
    }
}
