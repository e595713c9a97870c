use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl OutputFormat {
    /// Resolve the effective output format.
    /// If user specified a format, use it.
    /// Otherwise: TTY → Text, non-TTY (pipe) → Json
    pub fn resolve(user_choice: Option<OutputFormat>) -> OutputFormat {
        match user_choice {
            Some(fmt) => fmt,
            None => {
                if std::io::stdout().is_terminal() {
                    OutputFormat::Text
                } else {
                    OutputFormat::Json
                }
            }
        }
    }
}

#[derive(Parser)]
#[command(
    name = "memes",
    about = "Decaying workflow signals shared between orchestrator agents",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/memes/logs/memes.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to memes.yaml config file")]
    pub config: Option<PathBuf>,

    /// Meme state file (overrides paths.state)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Dynamics configuration file (overrides paths.dynamics)
    #[arg(long, global = true)]
    pub dynamics: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter dynamics config and an empty state file
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Show current signals
    Show {
        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Append one signal, then run a dynamics pass
    Emit {
        /// Kind of event the signal reports
        signal_type: String,

        /// Entity the signal concerns
        target: String,

        /// Category selecting the decay rate
        #[arg(long, default_value = "default")]
        category: String,

        /// Free-text annotation
        #[arg(long, short)]
        message: Option<String>,

        /// Extra data as key=value (value parsed as JSON when possible)
        #[arg(long = "data", short = 'd', value_name = "KEY=VALUE")]
        data: Vec<String>,

        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Interpret an orchestrator session and record the result
    Scribe {
        /// Session state JSON (reads stdin if omitted and no --summary given)
        #[arg(long)]
        session: Option<String>,

        /// Orchestrator summary, instead of a session document
        #[arg(long, conflicts_with = "session")]
        summary: Option<String>,

        /// Handoff reason to attach
        #[arg(long, requires = "summary")]
        reason: Option<String>,

        /// Project id used as the signal target
        #[arg(long, requires = "summary")]
        project: Option<String>,

        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Run one dynamics pass without adding signals
    Tick {
        /// Show the result without saving
        #[arg(long)]
        dry_run: bool,

        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Manage the documentation registry
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum RegistryAction {
    /// List registry records
    List {
        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Append a record (any JSON value)
    Add {
        /// Record as JSON
        record: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Get a specific config value
    Get {
        /// Config key (e.g., paths.state)
        key: String,
    },
}
