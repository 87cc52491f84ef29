//! CLI definitions for Aide.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Aide CLI.
#[derive(Parser)]
#[command(name = "aide")]
#[command(about = "Personal assistant backend: chat update delivery")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the server in foreground (default)
    Run {
        /// Server host (overrides [server].host)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides [server].port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Inspect or remove the push endpoint registered upstream
    Webhook {
        #[command(subcommand)]
        action: WebhookAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum WebhookAction {
    /// Show the push endpoint as the platform sees it
    Status,

    /// Remove the push endpoint
    Clear {
        /// Also discard events the platform is still buffering
        #[arg(long)]
        drop_pending: bool,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Validate the configuration and show the delivery mode it selects
    Check,
}
