use chrono::Utc;
use colored::*;
use eyre::{Context, Result};

use super::Workspace;
use crate::cli::OutputFormat;
use crate::meme::{MemeState, Signal, SignalStore};

const BAR_WIDTH: usize = 20;

pub fn run(format: OutputFormat, workspace: &Workspace) -> Result<()> {
    let store = workspace.store();
    let state = store
        .load()
        .with_context(|| format!("Failed to load meme state from {}", store.location()))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&state)?),
        OutputFormat::Text => print_text(&state, &store.location()),
    }
    Ok(())
}

fn print_text(state: &MemeState, location: &str) {
    println!("{} {}", "Signals in".bold(), location.cyan());
    println!();

    if state.signals.is_empty() {
        println!("  {}", "(no signals)".dimmed());
    } else {
        for signal in &state.signals {
            print_signal(signal);
        }
    }

    println!();
    println!(
        "  {} documentation registry records",
        state.documentation_registry.len()
    );
}

fn print_signal(signal: &Signal) {
    let age = match signal.last_updated_at() {
        Some(updated) => format!("{}m ago", Utc::now().signed_duration_since(updated).num_minutes()),
        None => "age unknown".to_string(),
    };
    println!(
        "  {} {:.3} {} {} {}",
        strength_bar(signal.strength.value()),
        signal.strength.value(),
        signal.signal_type.bold(),
        format!("→ {}", signal.target).cyan(),
        format!("[{}] {}", signal.category(), age).dimmed()
    );
    if !signal.message().is_empty() {
        println!("      {}", signal.message().dimmed());
    }
}

/// Strengths are usually within [0, 1]; anything above fills the bar
fn strength_bar(strength: f64) -> String {
    let filled = ((strength.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));
    if strength >= 0.66 {
        bar.green().to_string()
    } else if strength >= 0.33 {
        bar.yellow().to_string()
    } else {
        bar.red().to_string()
    }
}
