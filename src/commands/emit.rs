use colored::*;
use eyre::{Context, Result};
use indexmap::IndexMap;

use super::{Workspace, print_report, print_value};
use crate::cli::OutputFormat;
use crate::meme::{SignalStore, dynamics, store};
use crate::scribe::{SignalDraft, create_signal};

pub fn run(
    signal_type: &str,
    target: &str,
    category: &str,
    message: Option<&str>,
    data: &[String],
    format: OutputFormat,
    workspace: &Workspace,
) -> Result<()> {
    let dynamics_config = workspace.dynamics()?;
    let draft = SignalDraft {
        signal_type: signal_type.to_string(),
        target: target.to_string(),
        category: category.to_string(),
        message: message.unwrap_or_default().to_string(),
        data: parse_data(data)?,
    };

    // Stamp the signal once the lock is held
    let meme_store = workspace.store();
    let (signal, report) = store::update(&meme_store, |state| {
        let signal = create_signal(draft, &dynamics_config)?;
        state.push(signal.clone());
        Ok((signal, dynamics::run_pass(state, &dynamics_config)))
    })
    .with_context(|| format!("Failed to update meme state at {}", meme_store.location()))?;

    log::info!("Emitted signal {} ({} -> {})", signal.id, signal_type, target);
    if format != OutputFormat::Text {
        return print_value(format, &serde_json::json!({ "signal": signal, "report": report }));
    }

    println!(
        "{} Emitted {} {} {}",
        "✓".green(),
        signal_type.bold(),
        format!("→ {}", target).cyan(),
        signal.id.dimmed()
    );
    print_report(&report);
    Ok(())
}

/// Parse `key=value` pairs; values that are valid JSON keep their type
fn parse_data(pairs: &[String]) -> Result<IndexMap<String, serde_json::Value>> {
    let mut data = IndexMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| eyre::eyre!("Invalid data '{}' (expected KEY=VALUE)", pair))?;
        if key.is_empty() {
            eyre::bail!("Invalid data '{}': empty key", pair);
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        data.insert(key.to_string(), value);
    }
    Ok(data)
}
