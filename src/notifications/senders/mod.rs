use async_trait::async_trait;
use thiserror::Error;

use super::models::{ChannelConfig, OutgoingMessage};

pub mod telegram;
pub mod webhook;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Delivers an already rendered message through one channel type.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Fails unless the channel confirmed receipt.
    async fn send(
        &self,
        config: &ChannelConfig,
        message: &OutgoingMessage<'_>,
    ) -> Result<(), SenderError>;
}
