//! Initialize a workspace: starter dynamics config and an empty state file

use colored::*;
use eyre::{Context, Result};
use std::fs;
use std::path::Path;

use super::Workspace;
use crate::meme::dynamics::RawDynamicsConfig;
use crate::meme::{MemeState, SignalStore};

pub fn run(force: bool, workspace: &Workspace) -> Result<()> {
    println!("{}", "Initializing memes workspace".bold());
    println!();

    write_dynamics(&workspace.dynamics_path, force)?;
    write_state(workspace, force)?;

    println!();
    println!("Next: {} or {}", "memes emit <type> <target>".cyan(), "memes scribe".cyan());
    Ok(())
}

fn write_dynamics(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("  {} {} already exists (use --force to overwrite)", "⚠".yellow(), path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).context("Failed to create dynamics config directory")?;
    }

    let json =
        serde_json::to_string_pretty(&RawDynamicsConfig::starter()).context("Failed to serialize dynamics config")?;
    fs::write(path, json).context("Failed to write dynamics config")?;

    log::info!("Wrote starter dynamics config: {}", path.display());
    println!("  {} Created {}", "✓".green(), path.display());
    Ok(())
}

fn write_state(workspace: &Workspace, force: bool) -> Result<()> {
    let store = workspace.store();
    if store.exists() && !force {
        println!(
            "  {} {} already exists (use --force to reset)",
            "⚠".yellow(),
            store.path().display()
        );
        return Ok(());
    }

    let _guard = store.lock().context("Failed to lock meme state")?;
    store
        .save(&MemeState::default())
        .context("Failed to write empty meme state")?;
    println!("  {} Created {}", "✓".green(), store.path().display());
    Ok(())
}
