use colored::*;
use eyre::{Context, Result};

use super::{Workspace, print_report, print_value};
use crate::cli::OutputFormat;
use crate::meme::{SignalStore, dynamics, store};

pub fn run(dry_run: bool, format: OutputFormat, workspace: &Workspace) -> Result<()> {
    let dynamics_config = workspace.dynamics()?;
    let meme_store = workspace.store();

    let report = if dry_run {
        let mut state = meme_store
            .load()
            .with_context(|| format!("Failed to load meme state from {}", meme_store.location()))?;
        dynamics::run_pass(&mut state, &dynamics_config)
    } else {
        store::update(&meme_store, |state| Ok(dynamics::run_pass(state, &dynamics_config)))
            .with_context(|| format!("Failed to update meme state at {}", meme_store.location()))?
    };

    if format != OutputFormat::Text {
        return print_value(format, &serde_json::json!({ "dry_run": dry_run, "report": report }));
    }

    if dry_run {
        println!("{} Dry run, nothing saved", "→".blue());
    } else {
        println!("{} Dynamics applied to {}", "✓".green(), meme_store.location());
    }
    print_report(&report);
    Ok(())
}
