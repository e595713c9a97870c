use colored::*;
use eyre::{Context, Result};
use std::io::{self, Read};

use super::{Workspace, print_report, print_value};
use crate::cli::OutputFormat;
use crate::meme::SignalStore;
use crate::scribe::{Observation, Scribe, interpreter_for};

pub fn run(
    session: Option<&str>,
    summary: Option<&str>,
    reason: Option<&str>,
    project: Option<&str>,
    format: OutputFormat,
    workspace: &Workspace,
) -> Result<()> {
    let observation = match summary {
        Some(summary) => {
            let mut obs = Observation::new(summary).with_reason(reason.unwrap_or_default());
            if let Some(project) = project {
                obs = obs.with_project(project);
            }
            obs
        }
        None => read_session(session)?,
    };

    let dynamics_config = workspace.dynamics()?;
    let interpreter = interpreter_for(&dynamics_config).context("Failed to build interpreter")?;
    let meme_store = workspace.store();

    let outcome = Scribe::new(interpreter.as_ref())
        .record(&meme_store, &dynamics_config, &observation)
        .with_context(|| format!("Failed to record observation into {}", meme_store.location()))?;

    if format != OutputFormat::Text {
        return print_value(
            format,
            &serde_json::json!({ "appended": outcome.appended, "report": outcome.report }),
        );
    }

    match &outcome.appended {
        Some(signal) => println!(
            "{} Recorded {} {}",
            "✓".green(),
            signal.signal_type.bold(),
            format!("→ {}", signal.target).cyan()
        ),
        None => println!("{} No signal for this observation", "·".dimmed()),
    }
    print_report(&outcome.report);
    Ok(())
}

fn read_session(session: Option<&str>) -> Result<Observation> {
    // Read session state from stdin if not provided
    let session_str = match session {
        Some(s) => s.to_string(),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read session state from stdin")?;
            buffer
        }
    };

    let session: serde_json::Value = serde_json::from_str(&session_str).context("Failed to parse session state JSON")?;
    log::debug!("Session state: {}", session);
    Ok(Observation::from_session(&session))
}
