pub mod completions;
pub mod config;
pub mod emit;
pub mod init;
pub mod registry;
pub mod scribe;
pub mod show;
pub mod tick;

use colored::*;
use eyre::{Context, Result};
use std::path::PathBuf;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::meme::{DynamicsConfig, DynamicsReport, FileStore};

/// Resolved file locations for one invocation
pub struct Workspace {
    pub config: Config,
    pub state_path: PathBuf,
    pub dynamics_path: PathBuf,
}

impl Workspace {
    pub fn new(config: Config, state: Option<&PathBuf>, dynamics: Option<&PathBuf>) -> Self {
        let state_path = config.state_path(state);
        let dynamics_path = config.dynamics_path(dynamics);
        Self {
            config,
            state_path,
            dynamics_path,
        }
    }

    pub fn store(&self) -> FileStore {
        FileStore::new(self.state_path.clone()).with_lock_options(self.config.lock.options())
    }

    /// Dynamics config is read fresh on every invocation
    pub fn dynamics(&self) -> Result<DynamicsConfig> {
        DynamicsConfig::load(&self.dynamics_path)
            .with_context(|| format!("Failed to load dynamics config from {}", self.dynamics_path.display()))
    }
}

pub(crate) fn print_report(report: &DynamicsReport) {
    println!(
        "  {} decayed {}, amplified {}, pruned {}, {} surviving",
        "↻".blue(),
        report.decayed,
        report.amplified,
        report.pruned.to_string().yellow(),
        report.surviving.to_string().green()
    );
}

/// Structured output for json/yaml; text rendering stays with each command
pub(crate) fn print_value(format: OutputFormat, value: &serde_json::Value) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Text => println!("{}", value),
    }
    Ok(())
}
