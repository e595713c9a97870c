use clap::Parser;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

mod cli;
mod commands;
mod config;
mod meme;
mod scribe;

use cli::{Cli, Commands};
use commands::Workspace;
use config::{Config, LogLevel};

fn setup_logging(log_level: &LogLevel) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("memes")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("memes.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG env var takes precedence, otherwise use config log_level
    let mut builder = env_logger::Builder::new();

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(match log_level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Off => log::LevelFilter::Off,
        });
    }

    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    info!(
        "Log level: {} (from {})",
        log_level.as_filter(),
        if std::env::var("RUST_LOG").is_ok() { "RUST_LOG env" } else { "config" }
    );
    Ok(())
}

fn run(cli: Cli, config: Config) -> Result<()> {
    let workspace = Workspace::new(config, cli.state.as_ref(), cli.dynamics.as_ref());
    info!(
        "State: {}, dynamics: {}",
        workspace.state_path.display(),
        workspace.dynamics_path.display()
    );

    match cli.command {
        Commands::Init { force } => commands::init::run(force, &workspace),
        Commands::Show { format } => commands::show::run(cli::OutputFormat::resolve(format), &workspace),
        Commands::Emit {
            signal_type,
            target,
            category,
            message,
            data,
            format,
        } => commands::emit::run(
            &signal_type,
            &target,
            &category,
            message.as_deref(),
            &data,
            cli::OutputFormat::resolve(format),
            &workspace,
        ),
        Commands::Scribe {
            session,
            summary,
            reason,
            project,
            format,
        } => commands::scribe::run(
            session.as_deref(),
            summary.as_deref(),
            reason.as_deref(),
            project.as_deref(),
            cli::OutputFormat::resolve(format),
            &workspace,
        ),
        Commands::Tick { dry_run, format } => {
            commands::tick::run(dry_run, cli::OutputFormat::resolve(format), &workspace)
        }
        Commands::Registry { action } => commands::registry::run(action, &workspace),
        Commands::Config { action } => commands::config::run(action, &workspace),
        Commands::Completions { shell } => commands::completions::run(shell),
    }
}

fn main() -> Result<()> {
    // Parse CLI arguments first
    let cli = Cli::parse();

    // Load configuration (before logging, so log messages in Config::load are silent)
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging with log level from config (or RUST_LOG env var)
    setup_logging(&config.log_level).context("Failed to setup logging")?;

    info!("Starting memes with config from: {:?}", cli.config);

    run(cli, config).context("Command failed")?;

    Ok(())
}
