//! # Aide Source - Telegram
//!
//! [`UpdateSource`](aide_protocols::UpdateSource) implementation over the
//! Telegram Bot API (`setWebhook`, `deleteWebhook`, `getUpdates`,
//! `getWebhookInfo`).

mod api;
mod client;

pub use api::WebhookInfo;
pub use client::TelegramClient;
