//! Best-effort Telegram notifications
//!
//! Hints are mirrored to a configured chat. Delivery failures are logged and
//! never propagated to whatever triggered the send.

pub mod bot;

use anyhow::{bail, Context, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Telegram Bot API client.
pub struct Notifier {
    http: reqwest::Client,
    token: String,
    default_chat_id: Option<String>,
    api_url: String,
}

impl Notifier {
    pub fn new(token: String, default_chat_id: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            default_chat_id,
            api_url: TELEGRAM_API_URL.to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    /// Send a message to a specific chat.
    pub async fn send_to(&self, chat_id: &str, text: &str) -> Result<()> {
        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            .context("Telegram sendMessage failed")?;

        if !response.status().is_success() {
            bail!("Telegram sendMessage returned {}", response.status());
        }
        Ok(())
    }

    /// Send a message to the configured default chat. A missing default chat
    /// id disables notifications silently.
    pub async fn notify(&self, text: &str) -> Result<()> {
        match &self.default_chat_id {
            Some(chat_id) => self.send_to(chat_id, text).await,
            None => {
                debug!("No default chat configured, dropping notification");
                Ok(())
            }
        }
    }

    /// Fire-and-forget notify: spawned, failures logged and swallowed.
    pub fn fire_and_forget(self: &Arc<Self>, text: String) {
        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&text).await {
                warn!("Telegram notify failed: {}", e);
            }
        });
    }

    /// Long-poll for bot updates.
    pub(crate) async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<bot::Update>> {
        let response = self
            .http
            .get(self.method_url("getUpdates"))
            .query(&[("offset", offset.to_string()), ("timeout", timeout_secs.to_string())])
            .send()
            .await
            .context("Telegram getUpdates failed")?
            .error_for_status()
            .context("Telegram getUpdates rejected")?;

        let body: bot::UpdatesResponse = response
            .json()
            .await
            .context("Failed to parse Telegram updates")?;
        Ok(body.result)
    }
}
