//! Aide - personal assistant backend
//!
//! Main entry point for the Aide CLI and server.

mod cli;
mod cmd_config;
mod cmd_webhook;
mod handler;
mod server;

use clap::Parser;

use aide_config::ConfigLoader;

use cli::{Cli, Commands};
use cmd_config::handle_config_command;
use cmd_webhook::handle_webhook_command;
use server::{init_tracing, run_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load_or_default(&cli.config)?;

    // Initialize tracing with file and console output
    init_tracing(&config.logging)?;

    match cli.command {
        None => run_server(config).await,
        Some(Commands::Run { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            run_server(config).await
        }
        Some(Commands::Webhook { action }) => handle_webhook_command(action, &config).await,
        Some(Commands::Config { action }) => handle_config_command(action, &cli.config, &config),
    }
}
