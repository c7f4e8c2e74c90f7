use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::models::{ChannelConfig, NotificationContext, OutgoingMessage};
use super::senders::{
    NotificationSender, SenderError, telegram::TelegramSender, webhook::WebhookSender,
};
use super::templates;
use crate::db::enums::ChannelKind;
use crate::monitoring::models::NotificationKind;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Template error: {0}")]
    TemplateError(#[from] tera::Error),
    #[error("Sender error: {0}")]
    SenderError(#[from] SenderError),
}

/// Pushes one notification to a listing's recipient. `Ok` means the channel
/// confirmed delivery; anything else leaves the notification pending.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(
        &self,
        channel: ChannelKind,
        recipient: &str,
        kind: NotificationKind,
        context: &NotificationContext,
    ) -> Result<(), NotificationError>;
}

pub struct NotificationService {
    telegram: TelegramSender,
    webhook: WebhookSender,
    telegram_bot_token: String,
}

impl NotificationService {
    pub fn new(telegram_api_base: &str, telegram_bot_token: impl Into<String>) -> Self {
        Self {
            telegram: TelegramSender::new(telegram_api_base),
            webhook: WebhookSender::new(),
            telegram_bot_token: telegram_bot_token.into(),
        }
    }

    fn resolve(&self, channel: ChannelKind, recipient: &str) -> ChannelConfig {
        match channel {
            ChannelKind::Telegram => ChannelConfig::Telegram {
                bot_token: self.telegram_bot_token.clone(),
                chat_id: recipient.to_string(),
            },
            ChannelKind::Webhook => ChannelConfig::Webhook {
                url: recipient.to_string(),
            },
        }
    }
}

#[async_trait]
impl NotificationChannel for NotificationService {
    async fn send(
        &self,
        channel: ChannelKind,
        recipient: &str,
        kind: NotificationKind,
        context: &NotificationContext,
    ) -> Result<(), NotificationError> {
        let text = templates::render_message(kind, context)?;
        let message = OutgoingMessage {
            kind,
            text: &text,
            context,
        };
        let config = self.resolve(channel, recipient);

        match channel {
            ChannelKind::Telegram => self.telegram.send(&config, &message).await?,
            ChannelKind::Webhook => self.webhook.send(&config, &message).await?,
        }

        debug!(
            listing_id = context.listing_id,
            channel = %channel,
            kind = %kind,
            "Notification delivered."
        );
        Ok(())
    }
}
