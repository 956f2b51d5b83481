//! Command-line definition

use clap::{Parser, Subcommand};

use super::auth::AuthArgs;
use super::init::InitArgs;
use super::start::StartArgs;
use super::status::StatusArgs;
use super::sync::SyncArgs;

/// tasksync - move open Google Tasks into Todoist
#[derive(Parser)]
#[command(name = "tasksync", version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single sync pass
    Sync(SyncArgs),

    /// Sync continuously until interrupted
    Start(StartArgs),

    /// Show configuration and provider connectivity
    Status(StatusArgs),

    /// Create the config directory and a default config file
    Init(InitArgs),

    /// Authorize access to Google Tasks
    Auth(AuthArgs),

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
