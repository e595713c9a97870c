use colored::*;
use eyre::Result;

use super::Workspace;
use crate::cli::{ConfigAction, OutputFormat};
use crate::config::Config;

pub fn run(action: ConfigAction, workspace: &Workspace) -> Result<()> {
    match action {
        ConfigAction::Show { format } => show(OutputFormat::resolve(format), &workspace.config),
        ConfigAction::Get { key } => get(&key, &workspace.config),
    }
}

fn show(format: OutputFormat, config: &Config) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(config)?);
        }
        OutputFormat::Text => {
            println!("{}", "memes configuration".bold());
            println!();

            println!("{}:", "paths".cyan());
            println!("  state: {}", config.paths.state.display());
            println!("  dynamics: {}", config.paths.dynamics.display());
            println!();

            println!("{}:", "lock".cyan());
            println!("  timeout_ms: {}", config.lock.timeout_ms);
            println!();

            println!("{}: {}", "log_level".cyan(), config.log_level.as_filter());
        }
    }

    Ok(())
}

fn lookup(key: &str, config: &Config) -> Option<String> {
    match key {
        "paths.state" => Some(config.paths.state.display().to_string()),
        "paths.dynamics" => Some(config.paths.dynamics.display().to_string()),
        "lock.timeout_ms" => Some(config.lock.timeout_ms.to_string()),
        "log_level" | "log-level" => Some(config.log_level.as_filter().to_string()),
        _ => None,
    }
}

fn get(key: &str, config: &Config) -> Result<()> {
    match lookup(key, config) {
        Some(v) => println!("{}", v),
        None => eyre::bail!("Unknown config key: {}", key),
    }

    Ok(())
}
