use colored::*;
use eyre::{Context, Result};

use super::Workspace;
use crate::cli::{OutputFormat, RegistryAction};
use crate::meme::{SignalStore, store};

pub fn run(action: RegistryAction, workspace: &Workspace) -> Result<()> {
    match action {
        RegistryAction::List { format } => list(OutputFormat::resolve(format), workspace),
        RegistryAction::Add { record } => add(&record, workspace),
    }
}

fn list(format: OutputFormat, workspace: &Workspace) -> Result<()> {
    let state = workspace.store().load().context("Failed to load meme state")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state.documentation_registry)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&state.documentation_registry)?),
        OutputFormat::Text => {
            println!("{}", "Documentation registry:".bold());
            println!();
            if state.documentation_registry.is_empty() {
                println!("  {}", "(empty)".dimmed());
            }
            for (i, record) in state.documentation_registry.iter().enumerate() {
                println!("  {:3} {}", i.to_string().dimmed(), record);
            }
        }
    }
    Ok(())
}

fn add(record: &str, workspace: &Workspace) -> Result<()> {
    let record: serde_json::Value = serde_json::from_str(record).context("Record must be valid JSON")?;

    let meme_store = workspace.store();
    let count = store::update(&meme_store, |state| {
        state.documentation_registry.push(record);
        Ok(state.documentation_registry.len())
    })
    .with_context(|| format!("Failed to update meme state at {}", meme_store.location()))?;

    println!("{} Registry now holds {} records", "✓".green(), count);
    Ok(())
}
