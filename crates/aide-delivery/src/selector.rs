//! Delivery mode selection.
//!
//! Pure functions over configuration. No network call is made here, so the
//! same configuration always yields the same mode.

use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use tracing::info;
use url::{Host, Url};

use aide_config::DeliveryConfig;
use aide_protocols::DeliveryMode;

/// Host fragments that mark an unedited sample configuration.
const PLACEHOLDER_MARKERS: &[&str] = &["your-domain", "yourdomain", "placeholder", "changeme"];

/// Reserved documentation domains.
const PLACEHOLDER_DOMAINS: &[&str] = &["example.com", "example.org", "example.net"];

/// Why a callback URL cannot receive pushes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("no callback URL configured")]
    Missing,

    #[error("invalid callback URL '{0}'")]
    Invalid(String),

    #[error("callback URL must use https, got '{0}'")]
    InsecureScheme(String),

    #[error("callback host '{0}' is a loopback address")]
    Loopback(String),

    #[error("callback host '{0}' is a placeholder")]
    Placeholder(String),
}

/// Outcome of mode selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSelection {
    pub mode: DeliveryMode,
    /// The callback URL to register, set only for [`DeliveryMode::Push`].
    pub callback_url: Option<String>,
    /// Why push was not selected.
    pub reason: Option<TargetError>,
}

/// Check that `url` can be handed to the platform as a push target.
pub fn validate_target(url: &str) -> Result<Url, TargetError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(TargetError::Missing);
    }

    let parsed = Url::parse(trimmed).map_err(|_| TargetError::Invalid(trimmed.to_string()))?;
    if parsed.scheme() != "https" {
        return Err(TargetError::InsecureScheme(parsed.scheme().to_string()));
    }

    match parsed.host() {
        None => Err(TargetError::Invalid(trimmed.to_string())),
        Some(Host::Ipv4(addr)) if is_loopback_v4(addr) => Err(TargetError::Loopback(addr.to_string())),
        Some(Host::Ipv6(addr)) if is_loopback_v6(addr) => Err(TargetError::Loopback(addr.to_string())),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            if domain == "localhost" || domain.ends_with(".localhost") {
                return Err(TargetError::Loopback(domain));
            }
            if is_placeholder(&domain) {
                return Err(TargetError::Placeholder(domain));
            }
            Ok(parsed)
        }
        Some(_) => Ok(parsed),
    }
}

fn is_loopback_v4(addr: Ipv4Addr) -> bool {
    addr.is_loopback() || addr.is_unspecified()
}

fn is_loopback_v6(addr: Ipv6Addr) -> bool {
    addr.is_loopback() || addr.is_unspecified()
}

fn is_placeholder(domain: &str) -> bool {
    PLACEHOLDER_DOMAINS
        .iter()
        .any(|reserved| domain == *reserved || domain.ends_with(&format!(".{}", reserved)))
        || PLACEHOLDER_MARKERS.iter().any(|marker| domain.contains(marker))
}

/// Resolve the callback URL: an explicit webhook URL wins, otherwise the
/// base URL joined with the webhook path.
pub fn resolve_callback(
    webhook_url: Option<&str>,
    base_url: Option<&str>,
    webhook_path: &str,
) -> Option<String> {
    fn non_empty(value: Option<&str>) -> Option<&str> {
        value.map(str::trim).filter(|v| !v.is_empty())
    }

    if let Some(url) = non_empty(webhook_url) {
        return Some(url.to_string());
    }

    non_empty(base_url).map(|base| {
        let path = webhook_path.trim_start_matches('/');
        format!("{}/{}", base.trim_end_matches('/'), path)
    })
}

/// Decide the delivery mode for a (possibly absent) callback URL.
pub fn select_mode(callback_url: Option<&str>) -> DeliveryMode {
    match callback_url.map(validate_target) {
        Some(Ok(_)) => DeliveryMode::Push,
        _ => DeliveryMode::Pull,
    }
}

/// Select the delivery mode from configuration.
pub fn select(config: &DeliveryConfig) -> ModeSelection {
    let callback = resolve_callback(
        config.webhook_url.as_deref(),
        config.base_url.as_deref(),
        &config.webhook_path,
    );

    // Register the URL as configured; the platform echoes it back verbatim.
    let selection = match callback.as_deref().map(|url| (url, validate_target(url))) {
        Some((url, Ok(_))) => ModeSelection {
            mode: DeliveryMode::Push,
            callback_url: Some(url.trim().to_string()),
            reason: None,
        },
        Some((_, Err(reason))) => ModeSelection {
            mode: DeliveryMode::Pull,
            callback_url: None,
            reason: Some(reason),
        },
        None => ModeSelection {
            mode: DeliveryMode::Pull,
            callback_url: None,
            reason: Some(TargetError::Missing),
        },
    };

    match &selection.reason {
        None => info!(mode = %selection.mode, "Delivery mode selected"),
        Some(reason) => info!(mode = %selection.mode, %reason, "Delivery mode selected"),
    }
    selection
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
