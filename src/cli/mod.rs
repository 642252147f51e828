//! CLI module for the Treg research assistant
//!
//! Provides command-line interface parsing for the `treg-assistant` binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Treg Research Assistant
///
/// An Orchestrator agent that answers questions about regulatory T cell
/// biology and delegates literature search and data analysis to sub-agents.
#[derive(Parser, Debug)]
#[command(
    name = "treg-assistant",
    version,
    about = "Treg Research Assistant - multi-agent literature and analysis helper",
    after_help = "EXAMPLES:\n    \
                  treg-assistant ask \"What drives FOXP3 stability?\"\n    \
                  treg-assistant serve --port 8000\n    \
                  treg-assistant config --validate\n    \
                  treg-assistant --config my.toml agents"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "treg.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask the Orchestrator a single question
    Ask {
        /// The question to ask
        question: String,

        /// Session identifier recorded in logs
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Start the HTTP server
    Serve {
        /// Host address (overrides [server].host)
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides [server].port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show the effective configuration
    Config {
        /// Only validate the configuration file
        #[arg(long)]
        validate: bool,
    },

    /// List the agents and their capabilities
    Agents,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
