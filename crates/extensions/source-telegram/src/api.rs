//! Bot API wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aide_protocols::PushStatus;

/// Response envelope shared by every Bot API method.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<u16>,
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseParameters {
    #[serde(default)]
    pub retry_after: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SetWebhookRequest<'a> {
    pub url: &'a str,
    pub max_connections: u32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub allowed_updates: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeleteWebhookRequest {
    pub drop_pending_updates: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetUpdatesRequest<'a> {
    pub offset: i64,
    pub timeout: u64,
    pub limit: u32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub allowed_updates: &'a [String],
}

#[derive(Debug, Serialize)]
pub(crate) struct EmptyRequest {}

/// `getWebhookInfo` result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookInfo {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub has_custom_certificate: bool,
    #[serde(default)]
    pub pending_update_count: u32,
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Unix time of the most recent delivery error.
    #[serde(default)]
    pub last_error_date: Option<i64>,
    #[serde(default)]
    pub last_error_message: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub allowed_updates: Option<Vec<String>>,
}

impl From<WebhookInfo> for PushStatus {
    fn from(info: WebhookInfo) -> Self {
        PushStatus {
            url: info.url,
            pending_count: info.pending_update_count,
            last_error_message: info.last_error_message.filter(|m| !m.is_empty()),
            last_error_at: info
                .last_error_date
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
            max_connections: info.max_connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_error_fields() {
        let raw = r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 5","parameters":{"retry_after":5}}"#;
        let response: ApiResponse<bool> = serde_json::from_str(raw).unwrap();
        assert!(!response.ok);
        assert_eq!(response.error_code, Some(429));
        assert_eq!(response.parameters.unwrap().retry_after, Some(5));
    }

    #[test]
    fn test_webhook_info_to_push_status() {
        let raw = r#"{
            "url": "https://bot.acme.dev/webhook",
            "has_custom_certificate": false,
            "pending_update_count": 3,
            "last_error_date": 1700000000,
            "last_error_message": "Connection timed out",
            "max_connections": 40
        }"#;
        let info: WebhookInfo = serde_json::from_str(raw).unwrap();
        let status = PushStatus::from(info);
        assert_eq!(status.url, "https://bot.acme.dev/webhook");
        assert_eq!(status.pending_count, 3);
        assert_eq!(status.last_error_message.as_deref(), Some("Connection timed out"));
        assert_eq!(status.last_error_at.unwrap().timestamp(), 1700000000);
        assert_eq!(status.max_connections, Some(40));
    }

    #[test]
    fn test_empty_webhook_info() {
        let info: WebhookInfo =
            serde_json::from_str(r#"{"url":"","has_custom_certificate":false,"pending_update_count":0}"#)
                .unwrap();
        let status = PushStatus::from(info);
        assert!(!status.is_registered());
        assert!(status.last_error_at.is_none());
    }

    #[test]
    fn test_set_webhook_request_omits_empty_fields() {
        let request = SetWebhookRequest {
            url: "https://bot.acme.dev/webhook",
            max_connections: 40,
            allowed_updates: &[],
            secret_token: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("allowed_updates").is_none());
        assert!(json.get("secret_token").is_none());
    }
}
