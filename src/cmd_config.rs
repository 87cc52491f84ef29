//! Config subcommand handlers for Aide.

use std::path::Path;

use aide_config::{Config, ConfigValidator};
use aide_delivery::selector;

use crate::cli::ConfigAction;

/// Handle config subcommands.
pub(crate) fn handle_config_command(
    action: ConfigAction,
    path: &Path,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Check => config_check(path, config),
    }
}

/// Validate the configuration and show which delivery mode it selects.
fn config_check(path: &Path, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        println!("Config: {}", path.display());
    } else {
        println!("Config: {} (not found, using defaults)", path.display());
    }

    let validation = ConfigValidator::validate(config);
    for warning in &validation.warnings {
        println!("  warning: {}", warning);
    }
    for error in &validation.errors {
        println!("  error: {}", error);
    }

    println!("{}", describe_selection(config));

    if !validation.is_valid() {
        return Err(format!("configuration has {} error(s)", validation.errors.len()).into());
    }
    println!("Configuration OK");
    Ok(())
}

fn describe_selection(config: &Config) -> String {
    let selection = selector::select(&config.delivery);
    match (selection.callback_url, selection.reason) {
        (Some(url), _) => format!("Delivery: {} via {}", selection.mode, url),
        (None, Some(reason)) => format!("Delivery: {} ({})", selection.mode, reason),
        (None, None) => format!("Delivery: {}", selection.mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_pull_without_url() {
        let config = Config::default();
        assert_eq!(
            describe_selection(&config),
            "Delivery: pull (no callback URL configured)"
        );
    }

    #[test]
    fn test_describe_push() {
        let mut config = Config::default();
        config.delivery.base_url = Some("https://bot.acme.dev".to_string());
        assert_eq!(
            describe_selection(&config),
            "Delivery: push via https://bot.acme.dev/webhook"
        );
    }

    #[test]
    fn test_describe_placeholder_falls_back() {
        let mut config = Config::default();
        config.delivery.webhook_url = Some("https://your-domain.com/webhook".to_string());
        assert!(describe_selection(&config).starts_with("Delivery: pull (callback host"));
    }

    #[test]
    fn test_check_fails_without_token() {
        let config = Config::default();
        let result = config_check(Path::new("/nonexistent/aide.toml"), &config);
        assert!(result.is_err());
    }
}
