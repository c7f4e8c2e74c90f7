use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{NotificationSender, SenderError};
use crate::notifications::models::{ChannelConfig, OutgoingMessage};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A sender for pushing notifications via the Telegram Bot API.
pub struct TelegramSender {
    client: Client,
    api_base: String,
}

impl TelegramSender {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Serialize)]
struct TelegramMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[async_trait]
impl NotificationSender for TelegramSender {
    async fn send(
        &self,
        config: &ChannelConfig,
        message: &OutgoingMessage<'_>,
    ) -> Result<(), SenderError> {
        let (bot_token, chat_id) = match config {
            ChannelConfig::Telegram { bot_token, chat_id } => (bot_token, chat_id),
            _ => {
                return Err(SenderError::InvalidConfiguration(
                    "Expected Telegram config, but found a different type.".to_string(),
                ));
            }
        };
        if bot_token.is_empty() {
            return Err(SenderError::InvalidConfiguration(
                "Telegram bot token is not configured.".to_string(),
            ));
        }

        let api_url = format!("{}/bot{bot_token}/sendMessage", self.api_base);
        let payload = TelegramMessage {
            chat_id,
            text: message.text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(&api_url)
            .timeout(REQUEST_TIMEOUT)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Telegram API returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}
