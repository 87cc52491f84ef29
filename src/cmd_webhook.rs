//! Webhook subcommand handlers for Aide.

use std::path::PathBuf;

use tracing::{info, warn};

use aide_config::{Config, ConfigLoader};
use aide_daemon::PidFile;
use aide_protocols::{PushStatus, UpdateSource};
use aide_source_telegram::TelegramClient;

use crate::cli::WebhookAction;

/// Handle webhook subcommands.
pub(crate) async fn handle_webhook_command(
    action: WebhookAction,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = TelegramClient::new(&config.telegram)?;
    match action {
        WebhookAction::Status => webhook_status(&client).await,
        WebhookAction::Clear { drop_pending } => webhook_clear(&client, config, drop_pending).await,
    }
}

/// Print the push endpoint as the platform reports it.
async fn webhook_status(client: &TelegramClient) -> Result<(), Box<dyn std::error::Error>> {
    let status = client.query_push_status().await?;
    print!("{}", render_status(&status));
    Ok(())
}

fn render_status(status: &PushStatus) -> String {
    let mut out = String::new();
    if status.is_registered() {
        out.push_str(&format!("Push endpoint: {}\n", status.url));
    } else {
        out.push_str("Push endpoint: (none, long-polling allowed)\n");
    }
    out.push_str(&format!("Pending updates: {}\n", status.pending_count));
    if let Some(max) = status.max_connections {
        out.push_str(&format!("Max connections: {}\n", max));
    }
    if let Some(ref message) = status.last_error_message {
        match status.last_error_at {
            Some(at) => out.push_str(&format!("Last error: {} ({})\n", message, at.to_rfc3339())),
            None => out.push_str(&format!("Last error: {}\n", message)),
        }
    }
    out
}

/// Remove the push endpoint.
async fn webhook_clear(
    client: &TelegramClient,
    config: &Config,
    drop_pending: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pid_path = PathBuf::from(ConfigLoader::expand_path(
        &config.daemon.pid_file.to_string_lossy(),
    ));
    if let Some(pid) = PidFile::running_pid(&pid_path)? {
        warn!(
            "Aide is running (PID {}); it may register the endpoint again on restart",
            pid
        );
    }

    let removed = client.clear_push(drop_pending).await?;
    info!(drop_pending, removed, "Push endpoint cleared");
    if drop_pending {
        println!("Push endpoint cleared; pending updates dropped.");
    } else {
        println!("Push endpoint cleared.");
    }
    Ok(())
}
