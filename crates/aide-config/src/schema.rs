//! Configuration schema definitions.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration (webhook and health routes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Upstream chat platform (Bot API) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token. Usually supplied as `${TELEGRAM_BOT_TOKEN}`.
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Timeout for non-polling requests.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl TelegramConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

/// Inbound update delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Explicit public callback URL. Takes precedence over `base_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Public base URL; the callback is `base_url + webhook_path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Local route that receives pushed updates.
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,

    /// Shared secret the platform echoes on every push.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_allowed_updates")]
    pub allowed_updates: Vec<String>,

    /// Long-poll window for each pull fetch.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Maximum events per pull batch.
    #[serde(default = "default_poll_limit")]
    pub poll_limit: u32,

    /// Fixed delay between pull retries.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    #[serde(default = "default_registration_attempts")]
    pub registration_attempts: u32,

    #[serde(default = "default_registration_spacing")]
    pub registration_spacing_secs: u64,

    /// How many recent sequence ids the dedup guard remembers (0 disables it).
    #[serde(default = "default_dedup_window")]
    pub dedup_window: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            base_url: None,
            webhook_path: default_webhook_path(),
            secret_token: None,
            max_connections: default_max_connections(),
            allowed_updates: default_allowed_updates(),
            poll_timeout_secs: default_poll_timeout(),
            poll_limit: default_poll_limit(),
            retry_delay_secs: default_retry_delay(),
            registration_attempts: default_registration_attempts(),
            registration_spacing_secs: default_registration_spacing(),
            dedup_window: default_dedup_window(),
        }
    }
}

impl DeliveryConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn registration_spacing(&self) -> Duration {
        Duration::from_secs(self.registration_spacing_secs)
    }
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

fn default_max_connections() -> u32 {
    40
}

fn default_allowed_updates() -> Vec<String> {
    vec![
        "message".to_string(),
        "edited_message".to_string(),
        "callback_query".to_string(),
    ]
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_poll_limit() -> u32 {
    100
}

fn default_retry_delay() -> u64 {
    3
}

fn default_registration_attempts() -> u32 {
    3
}

fn default_registration_spacing() -> u64 {
    2
}

fn default_dedup_window() -> usize {
    1024
}

/// Process-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Path to PID file (single-instance guard).
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Graceful shutdown timeout (in seconds).
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Health check interval (in seconds).
    #[serde(default = "default_health_interval")]
    pub health_check_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            pid_file: default_pid_file(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            health_check_interval_secs: default_health_interval(),
        }
    }
}

impl DaemonConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }
}

fn default_pid_file() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".aide").join("aide.pid"))
        .unwrap_or_else(|| PathBuf::from("/tmp/aide.pid"))
}

fn default_shutdown_timeout() -> u64 {
    45 // one long poll plus slack
}

fn default_health_interval() -> u64 {
    30
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for rolling log files. Defaults to `~/.aide/logs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
        assert_eq!(config.delivery.webhook_path, "/webhook");
        assert_eq!(config.delivery.poll_timeout(), Duration::from_secs(30));
        assert_eq!(config.delivery.registration_attempts, 3);
        assert_eq!(config.delivery.registration_spacing(), Duration::from_secs(2));
        assert!(config.delivery.webhook_url.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_daemon_defaults() {
        let daemon = DaemonConfig::default();
        assert!(daemon.pid_file.ends_with("aide.pid"));
        assert_eq!(daemon.shutdown_timeout(), Duration::from_secs(45));
        assert_eq!(daemon.health_check_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_delivery_partial_toml() {
        let delivery: DeliveryConfig = toml::from_str(
            r#"
            webhook_url = "https://bot.acme.dev/webhook"
            retry_delay_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(delivery.webhook_url.as_deref(), Some("https://bot.acme.dev/webhook"));
        assert_eq!(delivery.retry_delay(), Duration::from_secs(5));
        assert_eq!(delivery.max_connections, 40);
        assert_eq!(delivery.allowed_updates.len(), 3);
    }
}
