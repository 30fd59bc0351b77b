use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "brewpair")]
#[command(about = "Coffee-date pairing rounds for a chat group", version)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "brewpair.toml")]
    pub config: PathBuf,

    /// Run the full pairing/evaluation logic without sending any message.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a new pairing round and invite every group.
    Invitation,
    /// Remind last round's groups that show no follow-up activity.
    Reminder,
}
