//! Interactive facilitation session on the terminal.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Context;

use bowtie_agent::{Conversation, LlmBackend};
use bowtie_core::session::Session;
use bowtie_core::wrap::DEFAULT_WORDS_PER_LINE;
use bowtie_core::AiSettings;

use crate::report;

const HELP: &str = "\
Commands:
  /json     print the current bowtie_data
  /render   print the Mermaid diagram
  /outline  print the diagram as a plain outline
  /sample   load the worked example bowtie
  /redraw   force the next render under a new key
  /help     show this help
  /quit     save bowtie_data.json and leave";

enum Step {
    Continue,
    Quit,
}

fn command(line: &str, session: &mut Session) -> Step {
    match line {
        "/quit" | "/exit" => return Step::Quit,
        "/json" => {
            if let Some(download) = session.export_json() {
                println!("{}", String::from_utf8_lossy(&download.bytes));
            }
        }
        "/render" => {
            if let Some(text) = session.compile_diagram(DEFAULT_WORDS_PER_LINE) {
                println!("%% {}\n{text}", session.render_key());
            }
        }
        "/outline" => {
            if let Some(text) = session.compile_outline(DEFAULT_WORDS_PER_LINE) {
                println!("{text}");
            }
        }
        "/sample" => session.load_sample(),
        "/redraw" => {
            session.toggle_redraw();
            println!("render key is now {}", session.render_key());
        }
        _ => println!("{HELP}"),
    }
    report(session);
    Step::Continue
}

pub(crate) async fn run(settings: AiSettings, out: &Path, transcript: Option<&Path>) -> anyhow::Result<()> {
    let backend = LlmBackend::new(settings)?;
    let mut conversation = Conversation::new();
    let mut session = Session::new();

    println!("Bowtie facilitation agent. Tell me about your hazard operation.");
    println!("Type /help for commands.");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("reading stdin")?;
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if prompt.starts_with('/') {
            match command(prompt, &mut session) {
                Step::Quit => break,
                Step::Continue => continue,
            }
        }

        let sent = conversation
            .send(&backend, prompt, &mut session, |chunk| {
                print!("{chunk}");
                let _ = std::io::stdout().flush();
            })
            .await;
        println!();
        match sent {
            Ok(exchange) if exchange.record_updated => {
                eprintln!("bowtie_data updated; /render to see the diagram");
            }
            Ok(_) => {}
            Err(e) => eprintln!("error: {e}"),
        }
        report(&mut session);
    }

    if let Some(path) = transcript {
        let json = serde_json::to_string_pretty(&conversation)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }
    if session.record.is_some() {
        if let Some(download) = session.export_json() {
            let saved = download.save_in(out)?;
            println!("saved {}", saved.display());
        }
    }
    Ok(())
}
